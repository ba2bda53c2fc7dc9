use std::path::Path;

use serde::{Deserialize, Serialize};

/// Requested optimization level for method bodies.
///
/// Synthesized methods without user code ignore this and are always emitted as `Release`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
  #[default]
  Debug,
  Release,
}

/// Options consumed by the code generator.
///
/// Expected format in `cinder.toml`:
/// ```toml
/// [codegen]
/// optimization = "release"
/// debug_plus = true
/// emit_sequence_points = true
/// max_expression_depth = 512
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
  pub optimization: OptimizationLevel,
  /// Release builds that keep user locals visible to a debugger.
  pub debug_plus: bool,
  /// Emit sequence points for methods that request debug info.
  pub emit_sequence_points: bool,
  /// Nesting depth after which an expression is reported as too complex.
  pub max_expression_depth: u32,
}

impl Default for CodegenOptions {
  fn default() -> Self {
    Self {
      optimization: OptimizationLevel::Debug,
      debug_plus: false,
      emit_sequence_points: true,
      max_expression_depth: 256,
    }
  }
}

impl CodegenOptions {
  pub fn release() -> Self {
    Self {
      optimization: OptimizationLevel::Release,
      ..Self::default()
    }
  }

  pub fn debug() -> Self {
    Self::default()
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugTrace {
  Codegen,
  Optimizer,
  Builder,
  Realize,
}

/// Controls the verbosity level of progress output.
///
/// - `Quiet`: No output except errors
/// - `Detailed`: Structured progress output (default)
/// - `Verbose`: Detailed output with internal phases
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputLevel {
  Quiet,
  #[default]
  Detailed,
  Verbose,
}

#[derive(Debug)]
pub enum ConfigError {
  Io { path: String, message: String },
  Parse(String),
  InvalidExpressionDepth(u32),
}

impl std::fmt::Display for ConfigError {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    match self {
      ConfigError::Io { path, message } => write!(f, "cannot read config '{}': {}", path, message),
      ConfigError::Parse(message) => write!(f, "invalid config: {}", message),
      ConfigError::InvalidExpressionDepth(depth) => {
        write!(f, "max_expression_depth must be greater than zero (got {})", depth)
      },
    }
  }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
  debug: bool,
  debug_trace: Vec<DebugTrace>,
  quiet: bool,
  verbose: u8,
  codegen: CodegenOptions,
}

#[derive(Debug, Clone, Default)]
pub struct CinderConfig {
  pub debug: bool,
  pub debug_trace: Vec<DebugTrace>,
  pub quiet: bool,
  pub verbose: u8,
  pub output_level: OutputLevel,
  pub codegen: CodegenOptions,
}

impl CinderConfig {
  pub fn new_basic(
    debug: bool,
    debug_trace: Vec<DebugTrace>,
    quiet: bool,
    verbose: u8,
  ) -> Self {
    let output_level = if quiet {
      OutputLevel::Quiet
    } else if verbose > 0 {
      OutputLevel::Verbose
    } else {
      OutputLevel::Detailed
    };

    Self {
      debug,
      debug_trace,
      quiet,
      verbose,
      output_level,
      codegen: CodegenOptions::default(),
    }
  }

  pub fn with_codegen(
    mut self,
    codegen: CodegenOptions,
  ) -> Self {
    self.codegen = codegen;
    self
  }

  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

    if file.codegen.max_expression_depth == 0 {
      return Err(ConfigError::InvalidExpressionDepth(0));
    }

    Ok(Self::new_basic(file.debug, file.debug_trace, file.quiet, file.verbose).with_codegen(file.codegen))
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;

    Self::from_toml_str(&source)
  }
}
