use cinder_bound::{BoundStatement, SequencePointKind};
use cinder_il::OpCode;
use cinder_type::span::Span;

use crate::{
  error::EmitResult,
  generator::{CodeGenerator, EmitStyle},
};

impl CodeGenerator<'_> {
  /// Marks the point, then lowers the statement it covers.
  ///
  /// In debug style a visible point that covers no code gets a `nop`, so the point cannot drift
  /// onto whatever instruction comes next.
  pub(crate) fn emit_sequence_point_statement(
    &mut self,
    point: &SequencePointKind,
    statement: Option<&BoundStatement>,
  ) -> EmitResult {
    let span = match point {
      SequencePointKind::Span(span) => Some(span),
      SequencePointKind::Hidden => None,
    };

    if self.emit_sequence_points {
      match span {
        Some(span) => self.emit_sequence_point(span),
        None => self.sink.define_hidden_sequence_point(),
      }
    }

    let before = self.sink.instructions_emitted();
    if let Some(statement) = statement {
      self.emit_statement(statement)?;
    }
    let emitted = self.sink.instructions_emitted() - before;

    if emitted == 0 && span.is_some() && self.style == EmitStyle::Debug {
      self.sink.emit_opcode(OpCode::Nop);
    }

    Ok(())
  }

  fn emit_sequence_point(
    &mut self,
    span: &Span,
  ) {
    if span.is_synthetic() {
      self.sink.define_hidden_sequence_point();
    } else {
      self.sink.define_sequence_point(span);
    }
  }
}
