use std::collections::{HashMap, HashSet};

use cinder_bound::{
  BoundExpression, BoundStatement, CatchBlock, ExpressionKind, LocalId, NoOpFlavor, StatementKind,
  SynthesizedLocalKind,
};
use cinder_config::{CinderConfig, DebugTrace};
use cinder_log::trace_dbg;

/// Locals that live on the evaluation stack and never get a slot.
pub type StackLocals = HashSet<LocalId>;

/// Rewrites a body before emission in release builds.
pub trait Optimizer {
  /// `debug_friendly` keeps user-declared locals in slots so they stay visible to a debugger.
  fn optimize(
    &mut self,
    body: BoundStatement,
    debug_friendly: bool,
  ) -> (BoundStatement, StackLocals);
}

/// Default optimizer: flattens statement lists and schedules single-use locals on the stack.
///
/// A local is kept on the stack when its only store is an `x = e;` statement and its only load is
/// the first value the very next statement evaluates. The value stored by the first statement is
/// then already on top of the stack when the second needs it.
pub struct StackScheduler {
  config: CinderConfig,
}

impl StackScheduler {
  pub fn new(config: &CinderConfig) -> Self {
    Self { config: config.clone() }
  }
}

impl Optimizer for StackScheduler {
  fn optimize(
    &mut self,
    body: BoundStatement,
    debug_friendly: bool,
  ) -> (BoundStatement, StackLocals) {
    let body = flatten(body);

    let mut usage = LocalUsage::default();
    usage.visit_statement(&body);

    let mut candidates = StackLocals::new();
    collect_adjacent_pairs(&body, &mut candidates);

    let stack_locals: StackLocals = candidates
      .into_iter()
      .filter(|local| usage.is_single_use(*local))
      .filter(|local| match usage.declared.get(local) {
        Some(kind) => !debug_friendly || *kind != SynthesizedLocalKind::UserDefined,
        None => false,
      })
      .collect();

    trace_dbg!(
      &self.config,
      DebugTrace::Optimizer,
      "{} stack locals (debug friendly: {})",
      stack_locals.len(),
      debug_friendly
    );

    (body, stack_locals)
  }
}

/// Inlines nested statement lists and drops plain no-ops.
fn flatten(statement: BoundStatement) -> BoundStatement {
  let BoundStatement {
    kind,
    span,
    compiler_generated,
  } = statement;

  let kind = match kind {
    StatementKind::Block { locals, statements } => StatementKind::Block {
      locals,
      statements: flatten_list(statements),
    },
    StatementKind::StatementList(statements) => StatementKind::StatementList(flatten_list(statements)),
    StatementKind::If {
      condition,
      then_branch,
      else_branch,
    } => StatementKind::If {
      condition,
      then_branch: Box::new(flatten(*then_branch)),
      else_branch: else_branch.map(|e| Box::new(flatten(*e))),
    },
    StatementKind::Loop { condition, body } => StatementKind::Loop {
      condition,
      body: Box::new(flatten(*body)),
    },
    StatementKind::Try {
      try_block,
      catch_blocks,
      finally_block,
    } => StatementKind::Try {
      try_block: Box::new(flatten(*try_block)),
      catch_blocks: catch_blocks
        .into_iter()
        .map(|catch| CatchBlock {
          body: flatten(catch.body),
          ..catch
        })
        .collect(),
      finally_block: finally_block.map(|f| Box::new(flatten(*f))),
    },
    StatementKind::SequencePoint { point, statement } => StatementKind::SequencePoint {
      point,
      statement: statement.map(|s| Box::new(flatten(*s))),
    },
    other => other,
  };

  BoundStatement {
    kind,
    span,
    compiler_generated,
  }
}

fn flatten_list(statements: Vec<BoundStatement>) -> Vec<BoundStatement> {
  let mut out = Vec::with_capacity(statements.len());
  for statement in statements {
    match flatten(statement) {
      BoundStatement {
        kind: StatementKind::StatementList(inner),
        ..
      } => out.extend(inner),
      BoundStatement {
        kind: StatementKind::NoOp(NoOpFlavor::Default),
        ..
      } => {},
      other => out.push(other),
    }
  }
  out
}

#[derive(Default)]
struct LocalUsage {
  /// Locals declared by blocks, with their kind. Sequence and catch locals are left out.
  declared: HashMap<LocalId, SynthesizedLocalKind>,
  excluded: HashSet<LocalId>,
  plain_stores: HashMap<LocalId, usize>,
  other_stores: HashSet<LocalId>,
  loads: HashMap<LocalId, usize>,
}

impl LocalUsage {
  fn is_single_use(
    &self,
    local: LocalId,
  ) -> bool {
    !self.excluded.contains(&local)
      && !self.other_stores.contains(&local)
      && self.plain_stores.get(&local) == Some(&1)
      && self.loads.get(&local) == Some(&1)
  }

  fn visit_statement(
    &mut self,
    statement: &BoundStatement,
  ) {
    match &statement.kind {
      StatementKind::Block { locals, statements } => {
        for local in locals {
          self.declared.insert(local.id, local.kind);
        }
        for statement in statements {
          self.visit_statement(statement);
        }
      },
      StatementKind::StatementList(statements) => {
        for statement in statements {
          self.visit_statement(statement);
        }
      },
      StatementKind::Expression(BoundExpression {
        kind: ExpressionKind::Assignment { target, value },
        ..
      }) if matches!(target.kind, ExpressionKind::Local(_)) => {
        if let ExpressionKind::Local(id) = target.kind {
          *self.plain_stores.entry(id).or_insert(0) += 1;
        }
        self.visit_expression(value);
      },
      StatementKind::If {
        condition,
        then_branch,
        else_branch,
      } => {
        self.visit_expression(condition);
        self.visit_statement(then_branch);
        if let Some(else_branch) = else_branch {
          self.visit_statement(else_branch);
        }
      },
      StatementKind::Loop { condition, body } => {
        if let Some(condition) = condition {
          self.visit_expression(condition);
        }
        self.visit_statement(body);
      },
      StatementKind::Try {
        try_block,
        catch_blocks,
        finally_block,
      } => {
        self.visit_statement(try_block);
        for catch in catch_blocks {
          if let Some(local) = &catch.local {
            self.excluded.insert(local.id);
          }
          self.visit_statement(&catch.body);
        }
        if let Some(finally_block) = finally_block {
          self.visit_statement(finally_block);
        }
      },
      StatementKind::SequencePoint {
        statement: Some(inner), ..
      } => self.visit_statement(inner),
      _ => {
        for expression in statement.own_expressions() {
          self.visit_expression(expression);
        }
      },
    }
  }

  fn visit_expression(
    &mut self,
    expression: &BoundExpression,
  ) {
    expression.walk(&mut |e| match &e.kind {
      ExpressionKind::Local(id) => *self.loads.entry(*id).or_insert(0) += 1,
      ExpressionKind::Assignment { target, .. } => {
        if let ExpressionKind::Local(id) = target.kind {
          self.other_stores.insert(id);
        }
      },
      ExpressionKind::Sequence { locals, .. } => {
        for local in locals {
          self.excluded.insert(local.id);
        }
      },
      _ => {},
    });
  }
}

/// Locals stored by one statement of a list and consumed first by the next one.
fn collect_adjacent_pairs(
  statement: &BoundStatement,
  out: &mut StackLocals,
) {
  match &statement.kind {
    StatementKind::Block { statements, .. } | StatementKind::StatementList(statements) => {
      for pair in statements.windows(2) {
        if let Some(local) = stored_local(&pair[0])
          && first_evaluated_local(&pair[1]) == Some(local)
        {
          out.insert(local);
        }
      }
      for statement in statements {
        collect_adjacent_pairs(statement, out);
      }
    },
    StatementKind::If {
      then_branch,
      else_branch,
      ..
    } => {
      collect_adjacent_pairs(then_branch, out);
      if let Some(else_branch) = else_branch {
        collect_adjacent_pairs(else_branch, out);
      }
    },
    StatementKind::Loop { body, .. } => collect_adjacent_pairs(body, out),
    StatementKind::Try {
      try_block,
      catch_blocks,
      finally_block,
    } => {
      collect_adjacent_pairs(try_block, out);
      for catch in catch_blocks {
        collect_adjacent_pairs(&catch.body, out);
      }
      if let Some(finally_block) = finally_block {
        collect_adjacent_pairs(finally_block, out);
      }
    },
    StatementKind::SequencePoint {
      statement: Some(inner), ..
    } => collect_adjacent_pairs(inner, out),
    _ => {},
  }
}

fn stored_local(statement: &BoundStatement) -> Option<LocalId> {
  match &statement.kind {
    StatementKind::Expression(BoundExpression {
      kind: ExpressionKind::Assignment { target, .. },
      ..
    }) => match target.kind {
      ExpressionKind::Local(id) => Some(id),
      _ => None,
    },
    _ => None,
  }
}

fn first_evaluated_local(statement: &BoundStatement) -> Option<LocalId> {
  match &statement.kind {
    StatementKind::Expression(e)
    | StatementKind::Return(Some(e))
    | StatementKind::Throw(Some(e))
    | StatementKind::If { condition: e, .. }
    | StatementKind::ConditionalGoto { condition: e, .. }
    | StatementKind::SwitchDispatch { expression: e, .. } => first_evaluated(e),
    _ => None,
  }
}

fn first_evaluated(expression: &BoundExpression) -> Option<LocalId> {
  match &expression.kind {
    ExpressionKind::Local(id) => Some(*id),
    ExpressionKind::Binary { left, .. } => first_evaluated(left),
    ExpressionKind::Unary { operand, .. } | ExpressionKind::Conversion { operand, .. } => first_evaluated(operand),
    ExpressionKind::Call {
      receiver: Some(receiver),
      ..
    } => first_evaluated(receiver),
    ExpressionKind::Call { arguments, .. } | ExpressionKind::ObjectCreation { arguments, .. } => {
      arguments.first().and_then(first_evaluated)
    },
    ExpressionKind::FieldAccess {
      receiver: Some(receiver),
      ..
    } => first_evaluated(receiver),
    ExpressionKind::Conditional { condition, .. } => first_evaluated(condition),
    ExpressionKind::Assignment { target, value } => match &target.kind {
      ExpressionKind::Local(_) | ExpressionKind::Parameter(_) => first_evaluated(value),
      ExpressionKind::FieldAccess { receiver: None, .. } => first_evaluated(value),
      _ => None,
    },
    _ => None,
  }
}
