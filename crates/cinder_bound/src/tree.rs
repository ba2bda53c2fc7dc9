use cinder_type::{span::Span, types::TypeId};
use ordered_float::OrderedFloat;

use crate::{FieldRef, LabelSymbolId, LocalId, LocalSymbol, MethodRef};

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
  Null,
  Bool(bool),
  Char(char),
  I32(i32),
  I64(i64),
  F64(OrderedFloat<f64>),
  Str(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  BitAnd,
  BitOr,
  Xor,
  Shl,
  Shr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  /// Short-circuiting `&&`.
  LogicalAnd,
  /// Short-circuiting `||`.
  LogicalOr,
}

impl BinaryOperator {
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      BinaryOperator::Eq
        | BinaryOperator::Ne
        | BinaryOperator::Lt
        | BinaryOperator::Le
        | BinaryOperator::Gt
        | BinaryOperator::Ge
    )
  }

  pub fn is_logical(self) -> bool {
    matches!(self, BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
  Neg,
  Not,
  BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpression {
  pub kind: ExpressionKind,
  pub ty: TypeId,
  pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
  Literal(ConstantValue),
  Local(LocalId),
  Parameter(u16),
  This,
  Assignment {
    target: Box<BoundExpression>,
    value: Box<BoundExpression>,
  },
  Binary {
    op: BinaryOperator,
    left: Box<BoundExpression>,
    right: Box<BoundExpression>,
  },
  Unary {
    op: UnaryOperator,
    operand: Box<BoundExpression>,
  },
  Call {
    method: MethodRef,
    receiver: Option<Box<BoundExpression>>,
    arguments: Vec<BoundExpression>,
  },
  ObjectCreation {
    constructor: MethodRef,
    arguments: Vec<BoundExpression>,
  },
  /// `receiver` is `None` for static fields.
  FieldAccess {
    field: FieldRef,
    receiver: Option<Box<BoundExpression>>,
  },
  /// Converts `operand` to the expression's own type.
  Conversion {
    operand: Box<BoundExpression>,
    checked: bool,
  },
  Conditional {
    condition: Box<BoundExpression>,
    when_true: Box<BoundExpression>,
    when_false: Box<BoundExpression>,
  },
  /// Evaluates `side_effects` in order, then yields `value`. `locals` are scoped to the sequence.
  Sequence {
    locals: Vec<LocalSymbol>,
    side_effects: Vec<BoundExpression>,
    value: Box<BoundExpression>,
  },
  Default,
  TypeToken(TypeId),
}

impl BoundExpression {
  pub fn new(
    kind: ExpressionKind,
    ty: TypeId,
    span: Span,
  ) -> Self {
    Self { kind, ty, span }
  }

  /// Calls the expression and its subexpressions in pre-order.
  pub fn walk<'a>(
    &'a self,
    visit: &mut dyn FnMut(&'a BoundExpression),
  ) {
    visit(self);
    match &self.kind {
      ExpressionKind::Literal(_)
      | ExpressionKind::Local(_)
      | ExpressionKind::Parameter(_)
      | ExpressionKind::This
      | ExpressionKind::Default
      | ExpressionKind::TypeToken(_) => {},
      ExpressionKind::Assignment { target, value } => {
        target.walk(visit);
        value.walk(visit);
      },
      ExpressionKind::Binary { left, right, .. } => {
        left.walk(visit);
        right.walk(visit);
      },
      ExpressionKind::Unary { operand, .. } | ExpressionKind::Conversion { operand, .. } => operand.walk(visit),
      ExpressionKind::Call { receiver, arguments, .. } => {
        if let Some(receiver) = receiver {
          receiver.walk(visit);
        }
        for arg in arguments {
          arg.walk(visit);
        }
      },
      ExpressionKind::ObjectCreation { arguments, .. } => {
        for arg in arguments {
          arg.walk(visit);
        }
      },
      ExpressionKind::FieldAccess { receiver, .. } => {
        if let Some(receiver) = receiver {
          receiver.walk(visit);
        }
      },
      ExpressionKind::Conditional {
        condition,
        when_true,
        when_false,
      } => {
        condition.walk(visit);
        when_true.walk(visit);
        when_false.walk(visit);
      },
      ExpressionKind::Sequence {
        side_effects, value, ..
      } => {
        for effect in side_effects {
          effect.walk(visit);
        }
        value.walk(visit);
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequencePointKind {
  Span(Span),
  Hidden,
}

/// Flavors of the no-op statement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoOpFlavor {
  /// A `nop` in debug builds so a breakpoint can bind; nothing otherwise.
  Default,
  /// Where an async method suspends.
  AwaitYieldPoint,
  /// Where an async method continues after a suspension. Always follows its yield point.
  AwaitResumePoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchBlock {
  /// `None` catches everything.
  pub exception_type: Option<TypeId>,
  pub local: Option<LocalSymbol>,
  pub body: BoundStatement,
  /// The catch-all that async lowering wraps around the whole state machine body.
  pub is_synthesized_async_catch_all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
  pub value: i32,
  pub label: LabelSymbolId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
  pub kind: StatementKind,
  pub span: Span,
  pub compiler_generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
  Block {
    locals: Vec<LocalSymbol>,
    statements: Vec<BoundStatement>,
  },
  /// A list without a scope of its own.
  StatementList(Vec<BoundStatement>),
  Expression(BoundExpression),
  Return(Option<BoundExpression>),
  If {
    condition: BoundExpression,
    then_branch: Box<BoundStatement>,
    else_branch: Option<Box<BoundStatement>>,
  },
  /// `while (condition) body`; an absent condition loops forever.
  Loop {
    condition: Option<BoundExpression>,
    body: Box<BoundStatement>,
  },
  Break,
  Continue,
  Goto(LabelSymbolId),
  Label(LabelSymbolId),
  ConditionalGoto {
    condition: BoundExpression,
    jump_if_true: bool,
    label: LabelSymbolId,
  },
  SwitchDispatch {
    expression: BoundExpression,
    cases: Vec<SwitchCase>,
    default_label: LabelSymbolId,
  },
  Try {
    try_block: Box<BoundStatement>,
    catch_blocks: Vec<CatchBlock>,
    finally_block: Option<Box<BoundStatement>>,
  },
  /// `None` rethrows the exception being handled.
  Throw(Option<BoundExpression>),
  SequencePoint {
    point: SequencePointKind,
    statement: Option<Box<BoundStatement>>,
  },
  NoOp(NoOpFlavor),
}

impl BoundStatement {
  pub fn new(
    kind: StatementKind,
    span: Span,
  ) -> Self {
    Self {
      kind,
      span,
      compiler_generated: false,
    }
  }

  pub fn generated(
    kind: StatementKind,
    span: Span,
  ) -> Self {
    Self {
      kind,
      span,
      compiler_generated: true,
    }
  }

  /// Calls `visit` for this statement and every nested statement in pre-order.
  pub fn walk<'a>(
    &'a self,
    visit: &mut dyn FnMut(&'a BoundStatement),
  ) {
    visit(self);
    match &self.kind {
      StatementKind::Block { statements, .. } | StatementKind::StatementList(statements) => {
        for statement in statements {
          statement.walk(visit);
        }
      },
      StatementKind::If {
        then_branch,
        else_branch,
        ..
      } => {
        then_branch.walk(visit);
        if let Some(else_branch) = else_branch {
          else_branch.walk(visit);
        }
      },
      StatementKind::Loop { body, .. } => body.walk(visit),
      StatementKind::Try {
        try_block,
        catch_blocks,
        finally_block,
      } => {
        try_block.walk(visit);
        for catch in catch_blocks {
          catch.body.walk(visit);
        }
        if let Some(finally_block) = finally_block {
          finally_block.walk(visit);
        }
      },
      StatementKind::SequencePoint {
        statement: Some(statement),
        ..
      } => statement.walk(visit),
      _ => {},
    }
  }

  /// Expressions evaluated directly by this statement, not by nested statements.
  pub fn own_expressions(&self) -> Vec<&BoundExpression> {
    match &self.kind {
      StatementKind::Expression(expr) => vec![expr],
      StatementKind::Return(Some(expr)) | StatementKind::Throw(Some(expr)) => vec![expr],
      StatementKind::If { condition, .. }
      | StatementKind::Loop {
        condition: Some(condition),
        ..
      }
      | StatementKind::ConditionalGoto { condition, .. } => vec![condition],
      StatementKind::SwitchDispatch { expression, .. } => vec![expression],
      _ => Vec::new(),
    }
  }
}
