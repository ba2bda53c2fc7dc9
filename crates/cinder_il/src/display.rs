use std::fmt::Write;

use cinder_type::types::TypeStore;

use crate::{HandlerKind, Operand, RealizedBody};

/// Textual IL listing of a realized body.
pub struct IlPrinter<'a> {
  body: &'a RealizedBody,
  types: &'a TypeStore,
  output: String,
}

impl<'a> IlPrinter<'a> {
  pub fn new(
    body: &'a RealizedBody,
    types: &'a TypeStore,
  ) -> Self {
    Self {
      body,
      types,
      output: String::new(),
    }
  }

  pub fn print(mut self) -> String {
    writeln!(self.output, ".maxstack {}", self.body.max_stack).unwrap();
    self.print_locals();

    let mut points = self.body.sequence_points.iter().peekable();

    for instruction in &self.body.instructions {
      while let Some(point) = points.next_if(|p| p.offset <= instruction.offset) {
        match &point.span {
          Some(span) => writeln!(self.output, "  // sequence point {}", span).unwrap(),
          None => writeln!(self.output, "  // hidden").unwrap(),
        }
      }

      match &instruction.operand {
        Operand::None => writeln!(self.output, "  IL_{:04x}: {}", instruction.offset, instruction.opcode).unwrap(),
        operand => writeln!(
          self.output,
          "  IL_{:04x}: {} {}",
          instruction.offset, instruction.opcode, operand
        )
        .unwrap(),
      }
    }

    for region in &self.body.exception_regions {
      let handler = match region.kind {
        HandlerKind::Catch(token) => format!("catch {}", token),
        HandlerKind::Finally => "finally".to_string(),
      };
      writeln!(
        self.output,
        "  .try IL_{:04x} to IL_{:04x} {} handler IL_{:04x} to IL_{:04x}",
        region.try_start, region.try_end, handler, region.handler_start, region.handler_end
      )
      .unwrap();
    }

    self.output
  }

  fn print_locals(&mut self) {
    if self.body.locals.is_empty() {
      return;
    }

    writeln!(self.output, ".locals init (").unwrap();
    for local in &self.body.locals {
      let name = local.name.clone().unwrap_or_else(|| local.slot.to_string());
      writeln!(
        self.output,
        "  [{}] {} {}",
        local.slot.0,
        self.types.type_name(&local.ty),
        name
      )
      .unwrap();
    }
    writeln!(self.output, ")").unwrap();
  }
}

pub fn print_il(
  body: &RealizedBody,
  types: &TypeStore,
) -> String {
  IlPrinter::new(body, types).print()
}
