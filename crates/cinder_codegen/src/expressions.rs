use cinder_bound::{
  BinaryOperator, BoundExpression, ConstantValue, ExpressionKind, FieldRef, LocalSymbol, MethodRef, UnaryOperator,
};
use cinder_diagnostics::DiagnosticMessage;
use cinder_il::{LabelId, OpCode};
use cinder_type::{
  span::Span,
  types::{Type, TypeId},
};

use crate::{
  error::{EmitCancelled, EmitResult},
  generator::CodeGenerator,
};

impl CodeGenerator<'_> {
  /// Lowers `expression`. With `used == false` its value is discarded and side-effect-free parts
  /// emit nothing.
  pub(crate) fn emit_expression(
    &mut self,
    expression: &BoundExpression,
    used: bool,
  ) -> EmitResult {
    self.enter_expression(&expression.span)?;
    let result = self.emit_expression_core(expression, used);
    self.expression_depth -= 1;
    result
  }

  fn enter_expression(
    &mut self,
    span: &Span,
  ) -> EmitResult {
    self.expression_depth += 1;
    if self.expression_depth > self.config.codegen.max_expression_depth {
      self.diagnostics.report(DiagnosticMessage::ExpressionTooComplex {
        depth: self.expression_depth,
        span: span.clone(),
      });
      return Err(EmitCancelled);
    }
    Ok(())
  }

  fn emit_expression_core(
    &mut self,
    expression: &BoundExpression,
    used: bool,
  ) -> EmitResult {
    match &expression.kind {
      ExpressionKind::Literal(value) => {
        if used {
          self.emit_constant(value);
        }
      },
      ExpressionKind::Local(local) => {
        if self.is_stack_local(*local) {
          // The value is already on the stack.
          if !used {
            self.sink.emit_opcode(OpCode::Pop);
          }
        } else if used {
          let slot = self.local_slot(*local);
          self.sink.emit_local_load(slot);
        }
      },
      ExpressionKind::Parameter(index) => {
        if used {
          let index = self.argument_index(*index);
          self.sink.emit_arg_load(index);
        }
      },
      ExpressionKind::This => {
        assert!(!self.method.is_static, "'this' in static method '{}'", self.method.name);
        if used {
          self.sink.emit_arg_load(0);
        }
      },
      ExpressionKind::Assignment { target, value } => self.emit_assignment(target, value, used)?,
      ExpressionKind::Binary { op, .. } if op.is_logical() => self.emit_logical_value(expression, used)?,
      ExpressionKind::Binary { op, left, right } => {
        self.emit_expression(left, true)?;
        self.emit_expression(right, true)?;
        self.emit_binary_operator(*op, left.ty);
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::Unary { op, operand } => {
        self.emit_expression(operand, true)?;
        match op {
          UnaryOperator::Neg => self.sink.emit_opcode(OpCode::Neg),
          UnaryOperator::BitNot => self.sink.emit_opcode(OpCode::Not),
          UnaryOperator::Not => {
            self.sink.emit_int_constant(0);
            self.sink.emit_opcode(OpCode::Ceq);
          },
        }
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::Call {
        method,
        receiver,
        arguments,
      } => self.emit_call(method, receiver.as_deref(), arguments, &expression.span, used)?,
      ExpressionKind::ObjectCreation { constructor, arguments } => {
        for argument in arguments {
          self.emit_expression(argument, true)?;
        }
        let token = self.module.translate_method(constructor, &expression.span, self.diagnostics);
        self
          .sink
          .emit_token(OpCode::Newobj, token, constructor.construct_stack_adjustment());
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::FieldAccess { field, receiver } => {
        self.emit_field_load(field, receiver.as_deref(), &expression.span)?;
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::Conversion { operand, checked } => {
        self.emit_expression(operand, true)?;
        self.emit_conversion(operand.ty, expression.ty, *checked, &expression.span);
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::Conditional {
        condition,
        when_true,
        when_false,
      } => {
        let else_label = self.sink.define_label();
        let end_label = self.sink.define_label();
        self.emit_cond_branch(condition, else_label, false)?;
        self.emit_expression(when_true, true)?;
        self.sink.emit_branch(OpCode::Br, end_label);
        // Both arms leave one value; the second starts from the height before the first.
        self.sink.adjust_stack(-1);
        self.sink.mark_label(else_label);
        self.emit_expression(when_false, true)?;
        self.sink.mark_label(end_label);
        self.emit_pop_if_unused(used);
      },
      ExpressionKind::Sequence {
        locals,
        side_effects,
        value,
      } => self.emit_sequence(locals, side_effects, value, used)?,
      ExpressionKind::Default => {
        if used {
          self.emit_default_value(expression.ty, &expression.span);
        }
      },
      ExpressionKind::TypeToken(ty) => {
        if used {
          let token = self.translate_type(*ty, &expression.span);
          self.sink.emit_token(OpCode::Ldtoken, token, 1);
        }
      },
    }

    Ok(())
  }

  fn emit_pop_if_unused(
    &mut self,
    used: bool,
  ) {
    if !used {
      self.sink.emit_opcode(OpCode::Pop);
    }
  }

  fn argument_index(
    &self,
    parameter: u16,
  ) -> u16 {
    if self.method.is_static {
      parameter
    } else {
      parameter + 1
    }
  }

  fn emit_constant(
    &mut self,
    value: &ConstantValue,
  ) {
    match value {
      ConstantValue::Null => self.sink.emit_opcode(OpCode::Ldnull),
      ConstantValue::Bool(b) => self.sink.emit_int_constant(i32::from(*b)),
      ConstantValue::Char(c) => self.sink.emit_int_constant(*c as u32 as i32),
      ConstantValue::I32(v) => self.sink.emit_int_constant(*v),
      ConstantValue::I64(v) => self.sink.emit_long_constant(*v),
      ConstantValue::F64(v) => self.sink.emit_double_constant(v.into_inner()),
      ConstantValue::Str(s) => {
        let token = self.module.translate_string(s);
        self.sink.emit_token(OpCode::Ldstr, token, 1);
      },
    }
  }

  fn emit_assignment(
    &mut self,
    target: &BoundExpression,
    value: &BoundExpression,
    used: bool,
  ) -> EmitResult {
    match &target.kind {
      ExpressionKind::Local(local) if self.is_stack_local(*local) => {
        // The value stays on the stack for its single reader.
        self.emit_expression(value, true)?;
        if used {
          self.sink.emit_opcode(OpCode::Dup);
        }
      },
      ExpressionKind::Local(local) => {
        self.emit_expression(value, true)?;
        if used {
          self.sink.emit_opcode(OpCode::Dup);
        }
        let slot = self.local_slot(*local);
        self.sink.emit_local_store(slot);
      },
      ExpressionKind::Parameter(index) => {
        self.emit_expression(value, true)?;
        if used {
          self.sink.emit_opcode(OpCode::Dup);
        }
        let index = self.argument_index(*index);
        self.sink.emit_arg_store(index);
      },
      ExpressionKind::FieldAccess {
        field,
        receiver: Some(receiver),
      } => {
        self.emit_expression(receiver, true)?;
        self.emit_expression(value, true)?;
        // `stfld` consumes the value, so a used result goes through a temp.
        let temp = if used {
          self.sink.emit_opcode(OpCode::Dup);
          let temp = self.allocate_temp(value.ty, &target.span);
          self.sink.emit_local_store(temp);
          Some(temp)
        } else {
          None
        };
        let token = self.module.translate_field(field, &target.span, self.diagnostics);
        self.sink.emit_token(OpCode::Stfld, token, -2);
        if let Some(temp) = temp {
          self.sink.emit_local_load(temp);
          self.free_temp(value.ty, temp);
        }
      },
      ExpressionKind::FieldAccess { field, receiver: None } => {
        self.emit_expression(value, true)?;
        if used {
          self.sink.emit_opcode(OpCode::Dup);
        }
        let token = self.module.translate_field(field, &target.span, self.diagnostics);
        self.sink.emit_token(OpCode::Stsfld, token, -1);
      },
      other => panic!("cannot assign to {:?}", other),
    }

    Ok(())
  }

  fn emit_binary_operator(
    &mut self,
    op: BinaryOperator,
    operand_type: TypeId,
  ) {
    let types = self.module.types();
    let unsigned = types.is_unsigned(&operand_type);
    let float = types.is_float(&operand_type);

    let pick = |signed: OpCode, unsigned_form: OpCode| if unsigned { unsigned_form } else { signed };

    match op {
      BinaryOperator::Add => self.sink.emit_opcode(OpCode::Add),
      BinaryOperator::Sub => self.sink.emit_opcode(OpCode::Sub),
      BinaryOperator::Mul => self.sink.emit_opcode(OpCode::Mul),
      BinaryOperator::Div => self.sink.emit_opcode(pick(OpCode::Div, OpCode::DivUn)),
      BinaryOperator::Rem => self.sink.emit_opcode(pick(OpCode::Rem, OpCode::RemUn)),
      BinaryOperator::BitAnd => self.sink.emit_opcode(OpCode::And),
      BinaryOperator::BitOr => self.sink.emit_opcode(OpCode::Or),
      BinaryOperator::Xor => self.sink.emit_opcode(OpCode::Xor),
      BinaryOperator::Shl => self.sink.emit_opcode(OpCode::Shl),
      BinaryOperator::Shr => self.sink.emit_opcode(pick(OpCode::Shr, OpCode::ShrUn)),
      BinaryOperator::Eq => self.sink.emit_opcode(OpCode::Ceq),
      BinaryOperator::Ne => {
        self.sink.emit_opcode(OpCode::Ceq);
        self.emit_logical_not();
      },
      BinaryOperator::Lt => self.sink.emit_opcode(pick(OpCode::Clt, OpCode::CltUn)),
      BinaryOperator::Gt => self.sink.emit_opcode(pick(OpCode::Cgt, OpCode::CgtUn)),
      // `a <= b` is `!(a > b)`; the unordered form keeps NaN comparisons false.
      BinaryOperator::Le => {
        let opcode = if unsigned || float { OpCode::CgtUn } else { OpCode::Cgt };
        self.sink.emit_opcode(opcode);
        self.emit_logical_not();
      },
      BinaryOperator::Ge => {
        let opcode = if unsigned || float { OpCode::CltUn } else { OpCode::Clt };
        self.sink.emit_opcode(opcode);
        self.emit_logical_not();
      },
      BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
        unreachable!("short-circuit operators lower through branches")
      },
    }
  }

  fn emit_logical_not(&mut self) {
    self.sink.emit_int_constant(0);
    self.sink.emit_opcode(OpCode::Ceq);
  }

  /// `a && b` and `a || b` as values: branch on the condition, then push 1 or 0.
  fn emit_logical_value(
    &mut self,
    expression: &BoundExpression,
    used: bool,
  ) -> EmitResult {
    let false_label = self.sink.define_label();
    let end_label = self.sink.define_label();

    self.emit_cond_branch(expression, false_label, false)?;
    self.sink.emit_int_constant(1);
    self.sink.emit_branch(OpCode::Br, end_label);
    self.sink.adjust_stack(-1);
    self.sink.mark_label(false_label);
    self.sink.emit_int_constant(0);
    self.sink.mark_label(end_label);
    self.emit_pop_if_unused(used);
    Ok(())
  }

  fn emit_call(
    &mut self,
    method: &MethodRef,
    receiver: Option<&BoundExpression>,
    arguments: &[BoundExpression],
    syntax: &Span,
    used: bool,
  ) -> EmitResult {
    if let Some(receiver) = receiver {
      self.emit_expression(receiver, true)?;
    }
    for argument in arguments {
      self.emit_expression(argument, true)?;
    }

    let opcode = if method.is_virtual && receiver.is_some() {
      OpCode::Callvirt
    } else {
      OpCode::Call
    };
    let token = self.module.translate_method(method, syntax, self.diagnostics);
    self.sink.emit_token(opcode, token, method.call_stack_adjustment());

    if !method.returns_void && !used {
      self.sink.emit_opcode(OpCode::Pop);
    }
    Ok(())
  }

  fn emit_field_load(
    &mut self,
    field: &FieldRef,
    receiver: Option<&BoundExpression>,
    syntax: &Span,
  ) -> EmitResult {
    match receiver {
      Some(receiver) => {
        self.emit_expression(receiver, true)?;
        let token = self.module.translate_field(field, syntax, self.diagnostics);
        self.sink.emit_token(OpCode::Ldfld, token, 0);
      },
      None => {
        let token = self.module.translate_field(field, syntax, self.diagnostics);
        self.sink.emit_token(OpCode::Ldsfld, token, 1);
      },
    }
    Ok(())
  }

  fn emit_sequence(
    &mut self,
    locals: &[LocalSymbol],
    side_effects: &[BoundExpression],
    value: &BoundExpression,
    used: bool,
  ) -> EmitResult {
    for local in locals {
      self.define_local(local);
    }
    for effect in side_effects {
      self.emit_expression(effect, false)?;
    }
    self.emit_expression(value, used)?;
    for local in locals {
      self.free_local(local);
    }
    Ok(())
  }

  fn emit_default_value(
    &mut self,
    ty: TypeId,
    syntax: &Span,
  ) {
    let types = self.module.types();

    if types.is_struct(&ty) {
      let temp = self.allocate_temp(ty, syntax);
      let token = self.translate_type(ty, syntax);
      self.sink.emit_local_address(temp);
      self.sink.emit_token(OpCode::Initobj, token, -1);
      self.sink.emit_local_load(temp);
      self.free_temp(ty, temp);
    } else if types.is_reference_type(&ty) {
      self.sink.emit_opcode(OpCode::Ldnull);
    } else if types.is_wide_integer(&ty) {
      self.sink.emit_long_constant(0);
    } else if types.is_float(&ty) {
      self.sink.emit_double_constant(0.0);
    } else {
      self.sink.emit_int_constant(0);
    }
  }

  fn emit_conversion(
    &mut self,
    from: TypeId,
    to: TypeId,
    checked: bool,
    syntax: &Span,
  ) {
    if from == to {
      return;
    }

    let types = self.module.types();
    let from_reference = types.is_reference_type(&from);
    let to_reference = types.is_reference_type(&to);

    match (from_reference, to_reference) {
      (false, true) => {
        let token = self.translate_type(from, syntax);
        self.sink.emit_token(OpCode::Box, token, 0);
      },
      (true, false) => {
        let token = self.translate_type(to, syntax);
        self.sink.emit_token(OpCode::UnboxAny, token, 0);
      },
      (true, true) => {
        if !matches!(types.get(&to), Type::Object) {
          let token = self.translate_type(to, syntax);
          self.sink.emit_token(OpCode::Castclass, token, 0);
        }
      },
      (false, false) => {
        for opcode in numeric_conversion(types.get(&from), types.get(&to), checked) {
          self.sink.emit_opcode(opcode);
        }
      },
    }
  }

  /// Branches to `target` when `condition` evaluates to `jump_if_true`.
  ///
  /// Short-circuit operators and comparisons fold into the branch instead of materializing a
  /// boolean.
  pub(crate) fn emit_cond_branch(
    &mut self,
    condition: &BoundExpression,
    target: LabelId,
    jump_if_true: bool,
  ) -> EmitResult {
    self.enter_expression(&condition.span)?;
    let result = self.emit_cond_branch_core(condition, target, jump_if_true);
    self.expression_depth -= 1;
    result
  }

  fn emit_cond_branch_core(
    &mut self,
    condition: &BoundExpression,
    target: LabelId,
    jump_if_true: bool,
  ) -> EmitResult {
    match &condition.kind {
      ExpressionKind::Binary {
        op: BinaryOperator::LogicalAnd,
        left,
        right,
      } => {
        if jump_if_true {
          let skip = self.sink.define_label();
          self.emit_cond_branch(left, skip, false)?;
          self.emit_cond_branch(right, target, true)?;
          self.sink.mark_label(skip);
        } else {
          self.emit_cond_branch(left, target, false)?;
          self.emit_cond_branch(right, target, false)?;
        }
      },
      ExpressionKind::Binary {
        op: BinaryOperator::LogicalOr,
        left,
        right,
      } => {
        if jump_if_true {
          self.emit_cond_branch(left, target, true)?;
          self.emit_cond_branch(right, target, true)?;
        } else {
          let skip = self.sink.define_label();
          self.emit_cond_branch(left, skip, true)?;
          self.emit_cond_branch(right, target, false)?;
          self.sink.mark_label(skip);
        }
      },
      ExpressionKind::Unary {
        op: UnaryOperator::Not,
        operand,
      } => self.emit_cond_branch(operand, target, !jump_if_true)?,
      ExpressionKind::Binary { op, left, right } if op.is_comparison() => {
        let types = self.module.types();
        let unordered = types.is_unsigned(&left.ty) || types.is_float(&left.ty);
        let opcode = compare_branch(*op, jump_if_true, unordered);
        self.emit_expression(left, true)?;
        self.emit_expression(right, true)?;
        self.sink.emit_branch(opcode, target);
      },
      ExpressionKind::Literal(ConstantValue::Bool(value)) => {
        if *value == jump_if_true {
          self.sink.emit_branch(OpCode::Br, target);
        }
      },
      _ => {
        self.emit_expression(condition, true)?;
        let opcode = if jump_if_true { OpCode::Brtrue } else { OpCode::Brfalse };
        self.sink.emit_branch(opcode, target);
      },
    }

    Ok(())
  }
}

/// Fused compare-and-branch opcode. `unordered` selects the `.un` forms where they matter:
/// unsigned operands, and NaN on the negated edge of float comparisons.
fn compare_branch(
  op: BinaryOperator,
  jump_if_true: bool,
  unordered: bool,
) -> OpCode {
  let pick = |ordered: OpCode, un: OpCode| if unordered { un } else { ordered };

  if jump_if_true {
    match op {
      BinaryOperator::Eq => OpCode::Beq,
      BinaryOperator::Ne => OpCode::BneUn,
      BinaryOperator::Lt => pick(OpCode::Blt, OpCode::BltUn),
      BinaryOperator::Le => pick(OpCode::Ble, OpCode::BleUn),
      BinaryOperator::Gt => pick(OpCode::Bgt, OpCode::BgtUn),
      BinaryOperator::Ge => pick(OpCode::Bge, OpCode::BgeUn),
      other => unreachable!("{:?} is not a comparison", other),
    }
  } else {
    match op {
      BinaryOperator::Eq => OpCode::BneUn,
      BinaryOperator::Ne => OpCode::Beq,
      BinaryOperator::Lt => pick(OpCode::Bge, OpCode::BgeUn),
      BinaryOperator::Le => pick(OpCode::Bgt, OpCode::BgtUn),
      BinaryOperator::Gt => pick(OpCode::Ble, OpCode::BleUn),
      BinaryOperator::Ge => pick(OpCode::Blt, OpCode::BltUn),
      other => unreachable!("{:?} is not a comparison", other),
    }
  }
}

fn numeric_conversion(
  from: &Type,
  to: &Type,
  checked: bool,
) -> Vec<OpCode> {
  let from_unsigned = matches!(from, Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::Char);
  let from_small_signed = matches!(from, Type::I8 | Type::I16 | Type::I32 | Type::Boolean);
  let from_small_unsigned = matches!(from, Type::U8 | Type::U16 | Type::Char);
  let pick = |plain: OpCode, overflow: OpCode| if checked { overflow } else { plain };

  match to {
    Type::I8 => vec![pick(OpCode::ConvI1, OpCode::ConvOvfI1)],
    Type::I16 => vec![pick(OpCode::ConvI2, OpCode::ConvOvfI2)],
    Type::U8 => vec![pick(OpCode::ConvU1, OpCode::ConvOvfU1)],
    Type::U16 | Type::Char => vec![pick(OpCode::ConvU2, OpCode::ConvOvfU2)],
    Type::I32 => {
      if from_small_unsigned || matches!(from, Type::I8 | Type::I16 | Type::Boolean) {
        Vec::new()
      } else if matches!(from, Type::U32) && !checked {
        Vec::new()
      } else {
        vec![pick(OpCode::ConvI4, OpCode::ConvOvfI4)]
      }
    },
    Type::U32 => {
      if from_small_unsigned || (from_small_signed && !checked) {
        Vec::new()
      } else {
        vec![pick(OpCode::ConvU4, OpCode::ConvOvfU4)]
      }
    },
    Type::I64 => {
      if from_unsigned && !matches!(from, Type::U64) {
        vec![OpCode::ConvU8]
      } else if matches!(from, Type::U64) && !checked {
        Vec::new()
      } else {
        vec![pick(OpCode::ConvI8, OpCode::ConvOvfI8)]
      }
    },
    Type::U64 => {
      if from_unsigned {
        vec![OpCode::ConvU8]
      } else if matches!(from, Type::I64) && !checked {
        Vec::new()
      } else if from_small_signed && !checked {
        vec![OpCode::ConvI8]
      } else {
        vec![pick(OpCode::ConvU8, OpCode::ConvOvfU8)]
      }
    },
    Type::F32 if from_unsigned => vec![OpCode::ConvRUn, OpCode::ConvR4],
    Type::F32 => vec![OpCode::ConvR4],
    Type::F64 if from_unsigned => vec![OpCode::ConvRUn, OpCode::ConvR8],
    Type::F64 => vec![OpCode::ConvR8],
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_compare_branch_negation_uses_unordered_forms() {
    assert_eq!(compare_branch(BinaryOperator::Lt, true, false), OpCode::Blt);
    assert_eq!(compare_branch(BinaryOperator::Lt, false, false), OpCode::Bge);
    assert_eq!(compare_branch(BinaryOperator::Lt, false, true), OpCode::BgeUn);
    assert_eq!(compare_branch(BinaryOperator::Eq, false, false), OpCode::BneUn);
    assert_eq!(compare_branch(BinaryOperator::Ne, true, true), OpCode::BneUn);
  }

  #[test]
  fn test_numeric_conversions() {
    assert!(numeric_conversion(&Type::I16, &Type::I32, false).is_empty());
    assert_eq!(numeric_conversion(&Type::I32, &Type::I64, false), vec![OpCode::ConvI8]);
    assert_eq!(numeric_conversion(&Type::U32, &Type::I64, false), vec![OpCode::ConvU8]);
    assert_eq!(numeric_conversion(&Type::I64, &Type::I32, true), vec![OpCode::ConvOvfI4]);
    assert_eq!(
      numeric_conversion(&Type::U32, &Type::F64, false),
      vec![OpCode::ConvRUn, OpCode::ConvR8]
    );
  }
}
