use cinder_type::{file::FileId, span::Span, types::TypeId};
use serde::Serialize;

use crate::{LocalDebugId, LocalSlot, OpCode, Operand, Token};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedInstruction {
  pub offset: u32,
  pub opcode: OpCode,
  pub operand: Operand,
  pub stack_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalInfo {
  pub slot: LocalSlot,
  pub ty: TypeId,
  pub token: Token,
  pub name: Option<String>,
  pub debug_id: Option<LocalDebugId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerKind {
  Catch(Token),
  Finally,
}

/// Half-open offset ranges `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionRegion {
  pub kind: HandlerKind,
  pub try_start: u32,
  pub try_end: u32,
  pub handler_start: u32,
  pub handler_end: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencePoint {
  pub offset: u32,
  pub document: FileId,
  /// `None` for hidden points.
  pub span: Option<Span>,
}

impl SequencePoint {
  pub fn is_hidden(&self) -> bool {
    self.span.is_none()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalScope {
  pub start: u32,
  pub end: u32,
  pub locals: Vec<LocalSlot>,
}

/// Final form of a method body: instructions with offsets plus the tables a writer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedBody {
  pub code_size: u32,
  pub max_stack: u32,
  pub instructions: Vec<RealizedInstruction>,
  pub locals: Vec<LocalInfo>,
  pub exception_regions: Vec<ExceptionRegion>,
  pub sequence_points: Vec<SequencePoint>,
  pub scopes: Vec<LocalScope>,
}

impl RealizedBody {
  pub fn opcodes(&self) -> Vec<OpCode> {
    self.instructions.iter().map(|i| i.opcode).collect()
  }

  pub fn instruction_at(
    &self,
    offset: u32,
  ) -> Option<&RealizedInstruction> {
    self
      .instructions
      .binary_search_by_key(&offset, |i| i.offset)
      .ok()
      .map(|index| &self.instructions[index])
  }

  pub fn count(
    &self,
    opcode: OpCode,
  ) -> usize {
    self.instructions.iter().filter(|i| i.opcode == opcode).count()
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }
}
