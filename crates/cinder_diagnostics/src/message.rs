use std::fmt;

use cinder_type::span::Span;

use super::diagnostic_report::{Diagnostic, Severity};

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticMessage {
  UnresolvedType {
    name: String,
    span: Span,
  },
  UnresolvedMethod {
    name: String,
    span: Span,
  },
  UnresolvedField {
    name: String,
    span: Span,
  },
  ExpressionTooComplex {
    depth: u32,
    span: Span,
  },
  TooManyLocals {
    method: String,
    span: Span,
  },
  /// An async yield point was removed by dead-code elimination.
  UnreachableYieldPoint {
    method: String,
    span: Span,
  },
}

impl fmt::Display for DiagnosticMessage {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      DiagnosticMessage::UnresolvedType { name, .. } => {
        write!(f, "Type '{}' cannot be referenced from emitted code", name)
      },
      DiagnosticMessage::UnresolvedMethod { name, .. } => {
        write!(f, "Method '{}' cannot be referenced from emitted code", name)
      },
      DiagnosticMessage::UnresolvedField { name, .. } => {
        write!(f, "Field '{}' cannot be referenced from emitted code", name)
      },
      DiagnosticMessage::ExpressionTooComplex { depth, .. } => {
        write!(f, "Expression is too deeply nested to compile (depth {})", depth)
      },
      DiagnosticMessage::TooManyLocals { method, .. } => {
        write!(f, "Method '{}' declares more locals than a method body can hold", method)
      },
      DiagnosticMessage::UnreachableYieldPoint { method, .. } => {
        write!(f, "An await in '{}' is unreachable and was removed", method)
      },
    }
  }
}

impl DiagnosticMessage {
  pub fn primary_span(&self) -> Span {
    match self {
      DiagnosticMessage::UnresolvedType { span, .. }
      | DiagnosticMessage::UnresolvedMethod { span, .. }
      | DiagnosticMessage::UnresolvedField { span, .. }
      | DiagnosticMessage::ExpressionTooComplex { span, .. }
      | DiagnosticMessage::TooManyLocals { span, .. }
      | DiagnosticMessage::UnreachableYieldPoint { span, .. } => span.clone(),
    }
  }

  pub fn code(&self) -> String {
    match self {
      DiagnosticMessage::UnresolvedType { .. } => "C0001",
      DiagnosticMessage::UnresolvedMethod { .. } => "C0002",
      DiagnosticMessage::UnresolvedField { .. } => "C0003",
      DiagnosticMessage::ExpressionTooComplex { .. } => "C0004",
      DiagnosticMessage::TooManyLocals { .. } => "C0005",
      DiagnosticMessage::UnreachableYieldPoint { .. } => "C0006",
    }
    .to_string()
  }

  fn level(&self) -> Severity {
    match self {
      DiagnosticMessage::UnreachableYieldPoint { .. } => Severity::Warning,
      _ => Severity::Error,
    }
  }

  pub fn report(&self) -> Diagnostic {
    let diagnostic = Diagnostic::new(self.level(), self.to_string(), self.code(), self.primary_span());

    match self {
      DiagnosticMessage::ExpressionTooComplex { .. } => {
        diagnostic.with_note("split the expression into smaller statements".to_string())
      },
      _ => diagnostic,
    }
  }
}
