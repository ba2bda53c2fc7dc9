use serde::Serialize;

use crate::{BytePosition, file::FileId};

/// Byte range inside a source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
  pub start: BytePosition,
  pub end: BytePosition,
  pub file: FileId,
}

impl Span {
  /// # Panics
  /// Panics in debug mode if `start > end`.
  pub fn new(
    file: FileId,
    start: BytePosition,
    end: BytePosition,
  ) -> Self {
    debug_assert!(
      start <= end,
      "Span::new() called with invalid range: start {} > end {}",
      start,
      end
    );
    Self { file, start, end }
  }

  /// Shorthand for `Span::new` with raw offsets.
  pub fn at(
    file: FileId,
    start: u32,
    end: u32,
  ) -> Self {
    Self::new(file, BytePosition(start), BytePosition(end))
  }

  /// Span for compiler-internal nodes that have no source text.
  pub fn synthetic() -> Self {
    Self::empty_at(FileId::SYNTHETIC, BytePosition(0))
  }

  pub fn merge(
    a: &Self,
    b: &Self,
  ) -> Self {
    debug_assert_eq!(a.file, b.file, "Cannot merge spans from different files");
    Self {
      file: a.file,
      start: a.start.min(b.start),
      end: a.end.max(b.end),
    }
  }

  pub fn empty_at(
    file: FileId,
    pos: BytePosition,
  ) -> Self {
    Self {
      file,
      start: pos,
      end: pos,
    }
  }

  pub fn len(&self) -> usize {
    self.end.0.saturating_sub(self.start.0) as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_synthetic(&self) -> bool {
    self.file == FileId::SYNTHETIC
  }

  pub fn contains(
    &self,
    other: &Self,
  ) -> bool {
    self.file == other.file && self.start <= other.start && other.end <= self.end
  }
}

impl std::fmt::Display for Span {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    if self.is_synthetic() {
      return write!(f, "<synthetic>");
    }
    write!(f, "{}..{}@{}", self.start, self.end, self.file.index())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_contains_requires_same_file() {
    let outer = Span::at(FileId::new(0), 0, 20);
    let inner = Span::at(FileId::new(0), 4, 8);
    let other = Span::at(FileId::new(1), 4, 8);

    assert!(outer.contains(&inner));
    assert!(!outer.contains(&other));
    assert!(!inner.contains(&outer));
  }

  #[test]
  fn test_display() {
    assert_eq!(Span::at(FileId::new(2), 3, 9).to_string(), "3..9@2");
    assert_eq!(Span::synthetic().to_string(), "<synthetic>");
  }
}
