use std::fmt;

/// The walk stopped early. The reason is already in the diagnostics bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitCancelled;

impl fmt::Display for EmitCancelled {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "code generation cancelled")
  }
}

impl std::error::Error for EmitCancelled {}

pub type EmitResult<T = ()> = Result<T, EmitCancelled>;
