use cinder_type::span::Span;

use crate::{BlockId, GroupId, LabelId, OpCode, Operand, RegionId, Token};

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
  pub opcode: OpCode,
  pub operand: Operand,
  pub stack_delta: i32,
}

impl Instruction {
  pub fn size(&self) -> u32 {
    self.opcode.size() + self.opcode.operand_size()
  }
}

/// Pending sequence point, attached in front of the instruction at `index`.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugPoint {
  Span(Span),
  Hidden,
}

/// A basic block: straight-line instructions ending with a terminator.
///
/// Blocks are laid out in creation order, so a block that falls through continues in the next one.
#[derive(Debug, Clone)]
pub struct BasicBlock {
  pub labels: Vec<LabelId>,
  pub instructions: Vec<Instruction>,
  pub terminator: Terminator,
  /// Innermost protected region or handler containing the block.
  pub region: Option<RegionId>,
  pub debug_points: Vec<(usize, DebugPoint)>,
}

impl BasicBlock {
  pub fn new(region: Option<RegionId>) -> Self {
    Self {
      labels: Vec::new(),
      instructions: Vec::new(),
      terminator: Terminator::FallThrough,
      region,
      debug_points: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty() && self.debug_points.is_empty() && self.terminator == Terminator::FallThrough
  }
}

/// How control leaves a basic block.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
  /// Continue with the next block in layout order.
  FallThrough,

  /// Unconditional jump. Becomes `leave` when it exits a protected region.
  Goto(LabelId),

  /// Conditional jump; falls through to the next block otherwise.
  Branch { opcode: OpCode, target: LabelId },

  /// Jump table; falls through to the next block when the value is out of range.
  Switch(Vec<LabelId>),

  Leave(LabelId),
  Return { has_value: bool },
  Throw,
  Rethrow,
  EndFinally,
}

impl Terminator {
  pub fn falls_through(&self) -> bool {
    matches!(
      self,
      Terminator::FallThrough | Terminator::Branch { .. } | Terminator::Switch(_)
    )
  }

  pub fn size(&self) -> u32 {
    match self {
      Terminator::FallThrough => 0,
      Terminator::Goto(_) | Terminator::Branch { .. } | Terminator::Leave(_) => 5,
      Terminator::Switch(targets) => 1 + 4 + 4 * targets.len() as u32,
      Terminator::Return { .. } | Terminator::Throw | Terminator::EndFinally => 1,
      Terminator::Rethrow => 2,
    }
  }
}

/// A position in the instruction stream: in front of `blocks[block].instructions[index]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Position {
  pub block: BlockId,
  pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LabelTarget {
  pub block: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub struct Marker {
  pub at: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
  Try,
  Catch(Token),
  Finally,
}

#[derive(Debug, Clone)]
pub struct Region {
  pub kind: RegionKind,
  pub group: GroupId,
  pub parent: Option<RegionId>,
  pub entry: BlockId,
}

/// One try statement: the protected region, its handlers, and the label after all of them.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
  pub end_label: LabelId,
  pub outer: Option<RegionId>,
  pub try_region: Option<RegionId>,
  pub handlers: Vec<RegionId>,
}
