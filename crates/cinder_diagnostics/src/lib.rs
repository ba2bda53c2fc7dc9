pub mod diagnostic_report;
pub mod message;

use std::fmt::Write;

use cinder_type::file::SourceMap;
use colored::*;
use diagnostic_report::{Diagnostic, Severity};

pub use diagnostic_report::DiagnosticBag;
pub use message::DiagnosticMessage;

pub fn render(
  diag: &Diagnostic,
  sm: &SourceMap,
) {
  println!("{}", format_diagnostic(diag, sm));
}

pub fn format_diagnostic(
  diag: &Diagnostic,
  sm: &SourceMap,
) -> String {
  let mut out = String::new();
  write_header(&mut out, diag);
  write_body(&mut out, diag, sm);

  for note in &diag.notes {
    writeln!(out, "  {} {}", "note:".cyan().bold(), note).unwrap();
  }

  out
}

fn write_header(
  out: &mut String,
  diag: &Diagnostic,
) {
  let message = diag.message.bold();
  let code = diag.error_code.bold();

  match diag.severity {
    Severity::Info => writeln!(out, "{}[{}]: {}", "Info".blue().bold(), code.blue(), message),
    Severity::Warning => writeln!(out, "{}[{}]: {}", "Warning".yellow().bold(), code.yellow(), message),
    Severity::Error => writeln!(out, "{}[{}]: {}", "Error".red().bold(), code.red().bold(), message),
    Severity::Hint => writeln!(out, "{}[{}]: {}", "Hint".cyan().bold(), code.cyan(), message),
  }
  .unwrap();
}

fn write_body(
  out: &mut String,
  diag: &Diagnostic,
  sm: &SourceMap,
) {
  let Some(doc) = sm.try_get(&diag.primary_span.file) else {
    writeln!(out, "{:2}{} {}", "", "-->".blue().bold(), "<compiler generated>".dimmed()).unwrap();
    return;
  };

  let start = sm.line_col(&diag.primary_span.file, diag.primary_span.start);

  writeln!(
    out,
    "{:2}{} {}:{}:{}",
    "",
    "-->".blue().bold(),
    doc.path.display().to_string().bold(),
    start.line.to_string().bold(),
    start.column.to_string().bold(),
  )
  .unwrap();

  let pipe = "|".blue().bold();
  writeln!(out, "{:3}{:3}", "", pipe).unwrap();

  for (i, line) in sm.snippet(&diag.primary_span).lines().enumerate() {
    if i == 0 {
      writeln!(out, "{}", line).unwrap();
    } else {
      writeln!(out, "{}", line.red().bold()).unwrap();
    }
  }

  for label in &diag.labels {
    let at = sm.line_col(&label.span.file, label.span.start);
    writeln!(out, "  {} {} ({})", "label:".yellow().bold(), label.message, at).unwrap();
  }
}
