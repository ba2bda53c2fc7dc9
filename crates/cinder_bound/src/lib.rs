//! Bound trees handed to the code generator.
//!
//! Trees arrive type-checked and lowered: no lambdas, no pattern matching, no `await`
//! expressions. Async methods appear as state machines that mark their suspension points with
//! [`NoOpFlavor::AwaitYieldPoint`] and [`NoOpFlavor::AwaitResumePoint`].

pub mod factory;
pub mod symbols;
pub mod tree;

pub use factory::BoundFactory;
pub use symbols::{
  BodySyntax, FieldRef, LabelSymbol, LabelSymbolId, LocalId, LocalSymbol, MethodDescriptor, MethodRef,
  SynthesizedLocalKind,
};
pub use tree::{
  BinaryOperator, BoundExpression, BoundStatement, CatchBlock, ConstantValue, ExpressionKind, NoOpFlavor,
  SequencePointKind, StatementKind, SwitchCase, UnaryOperator,
};
