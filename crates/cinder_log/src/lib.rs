//! Logging for the code generator.
//!
//! - Phase logging (`phase_log!`, `phase_ok!`, `phase_warn!`)
//! - Per-component debug traces (`trace_dbg!`)
//! - Verbose logging (`log_dbg!`, `log_trc!`)
//!
//! Everything is written to stderr so IL listings on stdout stay clean.

use cinder_config::{CinderConfig, DebugTrace};

pub fn effective_verbose(config: &CinderConfig) -> u8 {
  if config.quiet {
    return 0;
  }

  if config.debug && config.verbose < 2 {
    return 2;
  }

  config.verbose
}

pub fn log_phase(config: &CinderConfig) -> bool {
  !config.quiet
}

pub fn log_debug(config: &CinderConfig) -> bool {
  effective_verbose(config) >= 2
}

pub fn log_trace(config: &CinderConfig) -> bool {
  effective_verbose(config) >= 3
}

pub fn debug_trace_enabled(
  config: &CinderConfig,
  trace: DebugTrace,
) -> bool {
  !config.quiet && (config.debug || config.debug_trace.contains(&trace))
}

pub fn trace_name(trace: DebugTrace) -> &'static str {
  match trace {
    DebugTrace::Codegen => "codegen",
    DebugTrace::Optimizer => "optimizer",
    DebugTrace::Builder => "builder",
    DebugTrace::Realize => "realize",
  }
}

/// Log a phase message with an arrow prefix.
///
/// ```ignore
/// phase_log!(&config, "Emitting {} method bodies", count);
/// phase_log!(&config, indent = 8, "{}", method.name);
/// ```
#[macro_export]
macro_rules! phase_log {
  ($config:expr, indent = $indent:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!(
        "{:indent$}{} {}",
        "",
        "-->".bright_green().bold(),
        format!($fmt $(, $arg)*),
        indent = $indent
      );
    }
  }};

  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    $crate::phase_log!($config, indent = 4, $fmt $(, $arg)*);
  }};
}

#[macro_export]
macro_rules! phase_ok {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_green().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

#[macro_export]
macro_rules! phase_warn {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_phase($config) {
      use colored::Colorize;
      eprintln!("{} {}", "-->".bright_yellow().bold(), format!($fmt $(, $arg)*));
    }
  }};
}

/// Debug trace for one component. Output format: `debug[component]: message`.
///
/// ```ignore
/// trace_dbg!(&config, DebugTrace::Optimizer, "{} stack locals", count);
/// // debug[optimizer]: 2 stack locals
/// ```
#[macro_export]
macro_rules! trace_dbg {
  ($config:expr, $trace:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::debug_trace_enabled($config, $trace) {
      eprintln!(
        "debug[{}]: {}",
        $crate::trace_name($trace),
        format!($fmt $(, $arg)*)
      );
    }
  }};
}

/// Verbose debug message (verbosity >= 2).
#[macro_export]
macro_rules! log_dbg {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_debug($config) {
      eprintln!("debug: {}", format!($fmt $(, $arg)*));
    }
  }};
}

/// Trace message (verbosity >= 3).
#[macro_export]
macro_rules! log_trc {
  ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
    if $crate::log_trace($config) {
      eprintln!("trace: {}", format!($fmt $(, $arg)*));
    }
  }};
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_quiet_silences_everything() {
    let config = CinderConfig::new_basic(true, vec![DebugTrace::Codegen], true, 3);

    assert_eq!(effective_verbose(&config), 0);
    assert!(!log_phase(&config));
    assert!(!debug_trace_enabled(&config, DebugTrace::Codegen));
  }

  #[test]
  fn test_debug_implies_all_traces() {
    let config = CinderConfig::new_basic(true, vec![], false, 0);

    assert!(log_debug(&config));
    assert!(!log_trace(&config));
    assert!(debug_trace_enabled(&config, DebugTrace::Realize));
  }

  #[test]
  fn test_selected_trace_only() {
    let config = CinderConfig::new_basic(false, vec![DebugTrace::Optimizer], false, 0);

    assert!(debug_trace_enabled(&config, DebugTrace::Optimizer));
    assert!(!debug_trace_enabled(&config, DebugTrace::Builder));
  }
}
