//! Stack-machine instruction stream.
//!
//! The code generator emits into an [`InstructionSink`]. [`ILBuilder`] is the default sink: it
//! records basic blocks, protected regions, and debug points, then realizes them into a
//! [`RealizedBody`] with final offsets.

pub mod block;
pub mod body;
pub mod builder;
pub mod display;
pub mod opcode;
pub mod operand;
mod realize;
pub mod sink;
pub mod verify;

use cinder_type::Id;

pub use block::{
  BasicBlock, DebugPoint, HandlerGroup, Instruction, LabelTarget, Marker, Position, Region, RegionKind, Terminator,
};
pub use body::{ExceptionRegion, HandlerKind, LocalInfo, LocalScope, RealizedBody, RealizedInstruction, SequencePoint};
pub use builder::ILBuilder;
pub use display::print_il;
pub use opcode::OpCode;
pub use operand::{LocalSlot, Operand, Token};
pub use sink::{InstructionSink, LocalDebugId, LocalDeclaration, MarkerOffset, ScopeKind};
pub use verify::{VerifyError, VerifyResult, verify_body};

pub type BlockId = Id<BasicBlock>;
pub type LabelId = Id<LabelTarget>;
pub type MarkerId = Id<Marker>;
pub type RegionId = Id<Region>;
pub type GroupId = Id<HandlerGroup>;
