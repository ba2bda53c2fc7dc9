use cinder_type::span::Span;

use crate::message::DiagnosticMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Info,
  Warning,
  Error,
  Hint,
}

#[derive(Debug, Clone)]
pub struct Label {
  pub span: Span,
  pub message: String,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
  pub severity: Severity,
  pub message: String,
  pub error_code: String,
  pub primary_span: Span,
  pub labels: Vec<Label>,
  pub notes: Vec<String>,
}

impl Diagnostic {
  pub fn new(
    severity: Severity,
    message: String,
    error_code: String,
    primary_span: Span,
  ) -> Self {
    Self {
      severity,
      message,
      error_code,
      primary_span,
      labels: Vec::new(),
      notes: Vec::new(),
    }
  }

  pub fn with_label(
    mut self,
    span: Span,
    message: String,
  ) -> Self {
    self.labels.push(Label { span, message });
    self
  }

  pub fn with_note(
    mut self,
    note: String,
  ) -> Self {
    self.notes.push(note);
    self
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

/// Shared sink for diagnostics produced while lowering one or more method bodies.
///
/// Diagnostics are only ever appended.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
  diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(
    &mut self,
    diagnostic: Diagnostic,
  ) {
    self.diagnostics.push(diagnostic);
  }

  pub fn report(
    &mut self,
    message: DiagnosticMessage,
  ) {
    self.diagnostics.push(message.report());
  }

  pub fn has_errors(&self) -> bool {
    self.diagnostics.iter().any(Diagnostic::is_error)
  }

  pub fn error_count(&self) -> usize {
    self.diagnostics.iter().filter(|d| d.is_error()).count()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.diagnostics.iter()
  }

  pub fn codes(&self) -> Vec<&str> {
    self.diagnostics.iter().map(|d| d.error_code.as_str()).collect()
  }

  pub fn len(&self) -> usize {
    self.diagnostics.len()
  }

  pub fn is_empty(&self) -> bool {
    self.diagnostics.is_empty()
  }

  pub fn into_vec(self) -> Vec<Diagnostic> {
    self.diagnostics
  }
}
