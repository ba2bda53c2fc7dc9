use cinder_type::{file::FileId, span::Span, types::TypeId};
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{LabelId, LocalSlot, MarkerId, OpCode, Operand, RealizedBody, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
  /// Lexical scope for locals. Only recorded for the debugger.
  Variable,
  /// Groups a try block with its handlers. Closing it marks the label every `leave` targets.
  TryCatchFinally,
  Try,
  /// Handler entered with the exception object on the stack.
  Catch(Token),
  Finally,
}

/// Offset a marker resolved to after realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerOffset {
  Offset(u32),
  /// The marker sat in code that dead-code elimination removed.
  Unreachable,
}

impl MarkerOffset {
  pub fn offset(self) -> Option<u32> {
    match self {
      MarkerOffset::Offset(offset) => Some(offset),
      MarkerOffset::Unreachable => None,
    }
  }
}

/// Identifies a long-lived local across edits of its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LocalDebugId {
  pub syntax_offset: i32,
  pub ordinal: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalDeclaration {
  pub ty: TypeId,
  pub token: Token,
  /// `None` for short-lived temporaries.
  pub name: Option<String>,
  pub debug_id: Option<LocalDebugId>,
}

/// Append-only builder the code generator emits into.
///
/// Labels and markers are handles minted by the sink. Marker offsets can only be resolved after
/// [`InstructionSink::realize`].
pub trait InstructionSink {
  /// Appends a straight-line instruction. Control transfers have their own methods.
  fn emit(
    &mut self,
    opcode: OpCode,
    operand: Operand,
    stack_delta: i32,
  );

  fn emit_branch(
    &mut self,
    opcode: OpCode,
    label: LabelId,
  );

  fn emit_switch(
    &mut self,
    labels: &[LabelId],
  );

  fn emit_ret(
    &mut self,
    has_value: bool,
  );

  fn emit_throw(&mut self);

  fn emit_rethrow(&mut self);

  fn define_label(&mut self) -> LabelId;

  fn mark_label(
    &mut self,
    label: LabelId,
  );

  /// Records the position of the next instruction.
  fn allocate_marker(&mut self) -> MarkerId;

  fn set_initial_debug_document(
    &mut self,
    document: FileId,
  );

  fn define_sequence_point(
    &mut self,
    span: &Span,
  );

  fn define_hidden_sequence_point(&mut self);

  /// A hidden sequence point pinned to offset 0.
  fn define_initial_hidden_sequence_point(&mut self);

  fn open_local_scope(
    &mut self,
    kind: ScopeKind,
  );

  fn close_local_scope(&mut self);

  fn declare_local(
    &mut self,
    local: LocalDeclaration,
  ) -> LocalSlot;

  /// Instructions appended so far, terminators included.
  fn instructions_emitted(&self) -> usize;

  fn adjust_stack(
    &mut self,
    delta: i32,
  );

  fn stack_height(&self) -> u32;

  /// Whether control can reach the current position.
  fn can_fall_through(&self) -> bool;

  fn realize(&mut self);

  fn realized(&self) -> Option<&RealizedBody>;

  fn resolve_marker(
    &self,
    marker: MarkerId,
  ) -> MarkerOffset;

  fn is_realized(&self) -> bool {
    self.realized().is_some()
  }

  fn emit_opcode(
    &mut self,
    opcode: OpCode,
  ) {
    let delta = opcode
      .stack_delta()
      .unwrap_or_else(|| panic!("{} needs an explicit stack adjustment", opcode));
    self.emit(opcode, Operand::None, delta);
  }

  fn emit_token(
    &mut self,
    opcode: OpCode,
    token: Token,
    stack_delta: i32,
  ) {
    self.emit(opcode, Operand::Token(token), stack_delta);
  }

  fn emit_int_constant(
    &mut self,
    value: i32,
  ) {
    let opcode = match value {
      -1 => OpCode::LdcI4M1,
      0 => OpCode::LdcI40,
      1 => OpCode::LdcI41,
      2 => OpCode::LdcI42,
      3 => OpCode::LdcI43,
      4 => OpCode::LdcI44,
      5 => OpCode::LdcI45,
      6 => OpCode::LdcI46,
      7 => OpCode::LdcI47,
      8 => OpCode::LdcI48,
      v if i8::try_from(v).is_ok() => {
        self.emit(OpCode::LdcI4S, Operand::I4(v), 1);
        return;
      },
      v => {
        self.emit(OpCode::LdcI4, Operand::I4(v), 1);
        return;
      },
    };
    self.emit_opcode(opcode);
  }

  /// Small values go through `ldc.i4` + `conv.i8`.
  fn emit_long_constant(
    &mut self,
    value: i64,
  ) {
    match i32::try_from(value) {
      Ok(small) => {
        self.emit_int_constant(small);
        self.emit_opcode(OpCode::ConvI8);
      },
      Err(_) => self.emit(OpCode::LdcI8, Operand::I8(value), 1),
    }
  }

  fn emit_double_constant(
    &mut self,
    value: f64,
  ) {
    self.emit(OpCode::LdcR8, Operand::R8(OrderedFloat(value)), 1);
  }

  fn emit_local_load(
    &mut self,
    slot: LocalSlot,
  ) {
    match slot.0 {
      0 => self.emit_opcode(OpCode::Ldloc0),
      1 => self.emit_opcode(OpCode::Ldloc1),
      2 => self.emit_opcode(OpCode::Ldloc2),
      3 => self.emit_opcode(OpCode::Ldloc3),
      n if n <= 255 => self.emit(OpCode::LdlocS, Operand::Local(slot), 1),
      _ => self.emit(OpCode::Ldloc, Operand::Local(slot), 1),
    }
  }

  fn emit_local_store(
    &mut self,
    slot: LocalSlot,
  ) {
    match slot.0 {
      0 => self.emit_opcode(OpCode::Stloc0),
      1 => self.emit_opcode(OpCode::Stloc1),
      2 => self.emit_opcode(OpCode::Stloc2),
      3 => self.emit_opcode(OpCode::Stloc3),
      n if n <= 255 => self.emit(OpCode::StlocS, Operand::Local(slot), -1),
      _ => self.emit(OpCode::Stloc, Operand::Local(slot), -1),
    }
  }

  fn emit_local_address(
    &mut self,
    slot: LocalSlot,
  ) {
    if slot.0 <= 255 {
      self.emit(OpCode::LdlocaS, Operand::Local(slot), 1);
    } else {
      self.emit(OpCode::Ldloca, Operand::Local(slot), 1);
    }
  }

  fn emit_arg_load(
    &mut self,
    index: u16,
  ) {
    match index {
      0 => self.emit_opcode(OpCode::Ldarg0),
      1 => self.emit_opcode(OpCode::Ldarg1),
      2 => self.emit_opcode(OpCode::Ldarg2),
      3 => self.emit_opcode(OpCode::Ldarg3),
      n if n <= 255 => self.emit(OpCode::LdargS, Operand::Arg(n), 1),
      n => self.emit(OpCode::Ldarg, Operand::Arg(n), 1),
    }
  }

  fn emit_arg_store(
    &mut self,
    index: u16,
  ) {
    if index <= 255 {
      self.emit(OpCode::StargS, Operand::Arg(index), -1);
    } else {
      self.emit(OpCode::Starg, Operand::Arg(index), -1);
    }
  }
}
