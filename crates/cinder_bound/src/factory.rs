use cinder_type::{span::Span, types::TypeId};
use ordered_float::OrderedFloat;

use crate::{
  BinaryOperator, BoundExpression, BoundStatement, CatchBlock, ConstantValue, ExpressionKind, FieldRef, LabelSymbol,
  LabelSymbolId, LocalId, LocalSymbol, MethodRef, NoOpFlavor, SequencePointKind, StatementKind, SwitchCase,
  SynthesizedLocalKind, UnaryOperator,
};

/// Builds bound trees the way lowering passes do: every node gets the factory's current syntax.
pub struct BoundFactory {
  syntax: Span,
  next_local: u32,
  next_label: u32,
}

impl Default for BoundFactory {
  fn default() -> Self {
    Self::new(Span::synthetic())
  }
}

impl BoundFactory {
  pub fn new(syntax: Span) -> Self {
    Self {
      syntax,
      next_local: 0,
      next_label: 0,
    }
  }

  /// Subsequent nodes are attributed to `syntax`.
  pub fn at(
    &mut self,
    syntax: Span,
  ) -> &mut Self {
    self.syntax = syntax;
    self
  }

  pub fn syntax(&self) -> Span {
    self.syntax.clone()
  }

  pub fn local(
    &mut self,
    name: &str,
    ty: TypeId,
  ) -> LocalSymbol {
    self.synthesized_local(SynthesizedLocalKind::UserDefined, name, ty)
  }

  pub fn synthesized_local(
    &mut self,
    kind: SynthesizedLocalKind,
    name: &str,
    ty: TypeId,
  ) -> LocalSymbol {
    let id = LocalId::new(self.next_local);
    self.next_local += 1;
    LocalSymbol {
      id,
      name: name.to_string(),
      ty,
      kind,
      declarator: self.syntax.clone(),
    }
  }

  pub fn label(
    &mut self,
    name: &str,
  ) -> LabelSymbol {
    let id = LabelSymbolId::new(self.next_label);
    self.next_label += 1;
    LabelSymbol {
      id,
      name: name.to_string(),
    }
  }

  fn stmt(
    &self,
    kind: StatementKind,
  ) -> BoundStatement {
    BoundStatement::new(kind, self.syntax.clone())
  }

  fn expr(
    &self,
    kind: ExpressionKind,
    ty: TypeId,
  ) -> BoundExpression {
    BoundExpression::new(kind, ty, self.syntax.clone())
  }

  // Statements

  pub fn block(
    &self,
    locals: Vec<LocalSymbol>,
    statements: Vec<BoundStatement>,
  ) -> BoundStatement {
    self.stmt(StatementKind::Block { locals, statements })
  }

  pub fn list(
    &self,
    statements: Vec<BoundStatement>,
  ) -> BoundStatement {
    self.stmt(StatementKind::StatementList(statements))
  }

  pub fn expr_stmt(
    &self,
    expr: BoundExpression,
  ) -> BoundStatement {
    self.stmt(StatementKind::Expression(expr))
  }

  pub fn ret(
    &self,
    value: Option<BoundExpression>,
  ) -> BoundStatement {
    self.stmt(StatementKind::Return(value))
  }

  /// The return lowering appends at the natural end of a body.
  pub fn generated_ret(
    &self,
    value: Option<BoundExpression>,
  ) -> BoundStatement {
    BoundStatement::generated(StatementKind::Return(value), self.syntax.clone())
  }

  pub fn if_(
    &self,
    condition: BoundExpression,
    then_branch: BoundStatement,
    else_branch: Option<BoundStatement>,
  ) -> BoundStatement {
    self.stmt(StatementKind::If {
      condition,
      then_branch: Box::new(then_branch),
      else_branch: else_branch.map(Box::new),
    })
  }

  pub fn while_(
    &self,
    condition: Option<BoundExpression>,
    body: BoundStatement,
  ) -> BoundStatement {
    self.stmt(StatementKind::Loop {
      condition,
      body: Box::new(body),
    })
  }

  pub fn break_(&self) -> BoundStatement {
    self.stmt(StatementKind::Break)
  }

  pub fn continue_(&self) -> BoundStatement {
    self.stmt(StatementKind::Continue)
  }

  pub fn goto(
    &self,
    label: &LabelSymbol,
  ) -> BoundStatement {
    self.stmt(StatementKind::Goto(label.id))
  }

  pub fn label_stmt(
    &self,
    label: &LabelSymbol,
  ) -> BoundStatement {
    self.stmt(StatementKind::Label(label.id))
  }

  pub fn cond_goto(
    &self,
    condition: BoundExpression,
    jump_if_true: bool,
    label: &LabelSymbol,
  ) -> BoundStatement {
    self.stmt(StatementKind::ConditionalGoto {
      condition,
      jump_if_true,
      label: label.id,
    })
  }

  pub fn switch(
    &self,
    expression: BoundExpression,
    cases: Vec<(i32, &LabelSymbol)>,
    default_label: &LabelSymbol,
  ) -> BoundStatement {
    self.stmt(StatementKind::SwitchDispatch {
      expression,
      cases: cases
        .into_iter()
        .map(|(value, label)| SwitchCase { value, label: label.id })
        .collect(),
      default_label: default_label.id,
    })
  }

  pub fn try_catch(
    &self,
    try_block: BoundStatement,
    catch_blocks: Vec<CatchBlock>,
  ) -> BoundStatement {
    self.try_statement(try_block, catch_blocks, None)
  }

  pub fn try_finally(
    &self,
    try_block: BoundStatement,
    finally_block: BoundStatement,
  ) -> BoundStatement {
    self.try_statement(try_block, Vec::new(), Some(finally_block))
  }

  pub fn try_statement(
    &self,
    try_block: BoundStatement,
    catch_blocks: Vec<CatchBlock>,
    finally_block: Option<BoundStatement>,
  ) -> BoundStatement {
    assert!(
      !catch_blocks.is_empty() || finally_block.is_some(),
      "try statement needs a catch or a finally"
    );
    self.stmt(StatementKind::Try {
      try_block: Box::new(try_block),
      catch_blocks,
      finally_block: finally_block.map(Box::new),
    })
  }

  pub fn catch(
    &self,
    exception_type: Option<TypeId>,
    local: Option<LocalSymbol>,
    body: BoundStatement,
  ) -> CatchBlock {
    CatchBlock {
      exception_type,
      local,
      body,
      is_synthesized_async_catch_all: false,
    }
  }

  pub fn async_catch_all(
    &self,
    local: Option<LocalSymbol>,
    body: BoundStatement,
  ) -> CatchBlock {
    CatchBlock {
      exception_type: None,
      local,
      body,
      is_synthesized_async_catch_all: true,
    }
  }

  pub fn throw(
    &self,
    value: Option<BoundExpression>,
  ) -> BoundStatement {
    self.stmt(StatementKind::Throw(value))
  }

  /// Wraps `statement` in a sequence point covering the current syntax.
  pub fn sequence_point(
    &self,
    statement: BoundStatement,
  ) -> BoundStatement {
    self.stmt(StatementKind::SequencePoint {
      point: SequencePointKind::Span(self.syntax.clone()),
      statement: Some(Box::new(statement)),
    })
  }

  pub fn sequence_point_at(
    &self,
    span: Span,
    statement: Option<BoundStatement>,
  ) -> BoundStatement {
    self.stmt(StatementKind::SequencePoint {
      point: SequencePointKind::Span(span),
      statement: statement.map(Box::new),
    })
  }

  pub fn hidden_sequence_point(
    &self,
    statement: Option<BoundStatement>,
  ) -> BoundStatement {
    self.stmt(StatementKind::SequencePoint {
      point: SequencePointKind::Hidden,
      statement: statement.map(Box::new),
    })
  }

  pub fn nop(
    &self,
    flavor: NoOpFlavor,
  ) -> BoundStatement {
    self.stmt(StatementKind::NoOp(flavor))
  }

  // Expressions

  pub fn literal(
    &self,
    value: ConstantValue,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(ExpressionKind::Literal(value), ty)
  }

  pub fn int(
    &self,
    value: i32,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::I32(value), ty)
  }

  pub fn long(
    &self,
    value: i64,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::I64(value), ty)
  }

  pub fn double(
    &self,
    value: f64,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::F64(OrderedFloat(value)), ty)
  }

  pub fn bool(
    &self,
    value: bool,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::Bool(value), ty)
  }

  pub fn string(
    &self,
    value: &str,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::Str(value.to_string()), ty)
  }

  pub fn null(
    &self,
    ty: TypeId,
  ) -> BoundExpression {
    self.literal(ConstantValue::Null, ty)
  }

  pub fn local_ref(
    &self,
    local: &LocalSymbol,
  ) -> BoundExpression {
    self.expr(ExpressionKind::Local(local.id), local.ty)
  }

  pub fn param(
    &self,
    index: u16,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(ExpressionKind::Parameter(index), ty)
  }

  pub fn this(
    &self,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(ExpressionKind::This, ty)
  }

  pub fn assign(
    &self,
    target: BoundExpression,
    value: BoundExpression,
  ) -> BoundExpression {
    let ty = target.ty;
    self.expr(
      ExpressionKind::Assignment {
        target: Box::new(target),
        value: Box::new(value),
      },
      ty,
    )
  }

  /// `local = value;` as a statement.
  pub fn store(
    &self,
    local: &LocalSymbol,
    value: BoundExpression,
  ) -> BoundStatement {
    self.expr_stmt(self.assign(self.local_ref(local), value))
  }

  pub fn binary(
    &self,
    op: BinaryOperator,
    left: BoundExpression,
    right: BoundExpression,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(
      ExpressionKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
      },
      ty,
    )
  }

  pub fn unary(
    &self,
    op: UnaryOperator,
    operand: BoundExpression,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(
      ExpressionKind::Unary {
        op,
        operand: Box::new(operand),
      },
      ty,
    )
  }

  pub fn call(
    &self,
    method: MethodRef,
    receiver: Option<BoundExpression>,
    arguments: Vec<BoundExpression>,
  ) -> BoundExpression {
    let ty = method.return_type;
    self.expr(
      ExpressionKind::Call {
        method,
        receiver: receiver.map(Box::new),
        arguments,
      },
      ty,
    )
  }

  pub fn new_object(
    &self,
    constructor: MethodRef,
    arguments: Vec<BoundExpression>,
  ) -> BoundExpression {
    let ty = constructor.declaring_type;
    self.expr(ExpressionKind::ObjectCreation { constructor, arguments }, ty)
  }

  pub fn field(
    &self,
    field: FieldRef,
    receiver: Option<BoundExpression>,
  ) -> BoundExpression {
    let ty = field.ty;
    self.expr(
      ExpressionKind::FieldAccess {
        field,
        receiver: receiver.map(Box::new),
      },
      ty,
    )
  }

  pub fn convert(
    &self,
    operand: BoundExpression,
    ty: TypeId,
    checked: bool,
  ) -> BoundExpression {
    self.expr(
      ExpressionKind::Conversion {
        operand: Box::new(operand),
        checked,
      },
      ty,
    )
  }

  pub fn conditional(
    &self,
    condition: BoundExpression,
    when_true: BoundExpression,
    when_false: BoundExpression,
  ) -> BoundExpression {
    let ty = when_true.ty;
    self.expr(
      ExpressionKind::Conditional {
        condition: Box::new(condition),
        when_true: Box::new(when_true),
        when_false: Box::new(when_false),
      },
      ty,
    )
  }

  pub fn sequence(
    &self,
    locals: Vec<LocalSymbol>,
    side_effects: Vec<BoundExpression>,
    value: BoundExpression,
  ) -> BoundExpression {
    let ty = value.ty;
    self.expr(
      ExpressionKind::Sequence {
        locals,
        side_effects,
        value: Box::new(value),
      },
      ty,
    )
  }

  pub fn default_of(
    &self,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(ExpressionKind::Default, ty)
  }

  pub fn type_token(
    &self,
    of: TypeId,
    ty: TypeId,
  ) -> BoundExpression {
    self.expr(ExpressionKind::TypeToken(of), ty)
  }
}
