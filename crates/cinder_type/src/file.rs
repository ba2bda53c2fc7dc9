use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use ahash::AHasher;
use serde::Serialize;

use crate::{BytePosition, Id, Store, span::Span};

/// Identifies a debug document. Sequence points refer to documents through this id.
pub type FileId = Id<SourceDocument>;

impl FileId {
  /// Sentinel for compiler-internal nodes. Never collides with a real document index.
  pub const SYNTHETIC: FileId = FileId::new(u32::MAX);
}

#[derive(Clone, Debug)]
pub struct SourceDocument {
  pub path: PathBuf,
  pub text: String,
  pub line_starts: Vec<BytePosition>,
  /// Content checksum recorded next to sequence points.
  pub checksum: u64,
}

impl SourceDocument {
  pub fn new(
    path: PathBuf,
    text: String,
  ) -> Self {
    let line_starts = compute_line_starts(&text);
    let checksum = checksum_of(&text);
    Self {
      path,
      text,
      line_starts,
      checksum,
    }
  }
}

/// One-based line and column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineColumn {
  pub line: u32,
  pub column: u32,
}

impl std::fmt::Display for LineColumn {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

#[derive(Default)]
pub struct SourceMap {
  documents: Store<SourceDocument>,
  by_path: HashMap<PathBuf, FileId>,
}

impl SourceMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_file<P: Into<PathBuf>>(
    &mut self,
    path: P,
    text: String,
  ) -> FileId {
    let path = path.into();

    if let Some(id) = self.by_path.get(&path) {
      return *id;
    }

    let id = self.documents.alloc(SourceDocument::new(path.clone(), text));
    self.by_path.insert(path, id);
    id
  }

  pub fn add_virtual(
    &mut self,
    label: &str,
    text: String,
  ) -> FileId {
    let path = PathBuf::from(format!("<{}>", label));
    self.documents.alloc(SourceDocument::new(path, text))
  }

  #[inline]
  pub fn get(
    &self,
    id: &FileId,
  ) -> &SourceDocument {
    self.documents.get(id)
  }

  /// Returns `None` for the synthetic document.
  pub fn try_get(
    &self,
    id: &FileId,
  ) -> Option<&SourceDocument> {
    if *id == FileId::SYNTHETIC || id.index() as usize >= self.documents.len() {
      return None;
    }
    Some(self.documents.get(id))
  }

  pub fn line_col(
    &self,
    file: &FileId,
    pos: BytePosition,
  ) -> LineColumn {
    let doc = self.get(file);
    let line = upper_bound_line(&doc.line_starts, pos);
    let line_start = doc.line_starts[line].0 as usize;
    let end = (pos.0 as usize).min(doc.text.len());
    let column = unicode_column(&doc.text.as_bytes()[line_start..end]);

    LineColumn {
      line: line as u32 + 1,
      column: column as u32 + 1,
    }
  }

  pub fn slice(
    &self,
    span: &Span,
  ) -> &str {
    let doc = self.get(&span.file);
    &doc.text[span.start.0 as usize..span.end.0 as usize]
  }

  pub fn snippet(
    &self,
    span: &Span,
  ) -> String {
    let start = self.line_col(&span.file, span.start);
    let doc = self.get(&span.file);
    let line_idx = (start.line - 1) as usize;
    let line_start = doc.line_starts[line_idx].0 as usize;
    let line_end = doc
      .line_starts
      .get(line_idx + 1)
      .map(|p| p.0 as usize)
      .unwrap_or(doc.text.len());

    let line_str = doc.text[line_start..line_end].trim_end_matches(&['\r', '\n'][..]);
    let caret = " ".repeat((start.column - 1) as usize) + &"^".repeat(span.len().max(1));

    format!("{:>4} | {}\n     | {}", start.line, line_str, caret)
  }
}

fn compute_line_starts(text: &str) -> Vec<BytePosition> {
  let mut starts = vec![BytePosition(0)];
  starts.extend(
    text
      .bytes()
      .enumerate()
      .filter(|(_, b)| *b == b'\n')
      .map(|(i, _)| BytePosition(i as u32 + 1)),
  );
  starts
}

fn upper_bound_line(
  starts: &[BytePosition],
  pos: BytePosition,
) -> usize {
  starts.partition_point(|start| start.0 <= pos.0).saturating_sub(1)
}

fn unicode_column(slice: &[u8]) -> usize {
  std::str::from_utf8(slice)
    .map(|s| s.chars().count())
    .unwrap_or(slice.len())
}

fn checksum_of(text: &str) -> u64 {
  let mut hasher = AHasher::default();
  text.hash(&mut hasher);
  hasher.finish()
}
