use ordered_float::OrderedFloat;
use serde::Serialize;

/// Metadata token: table number in the high byte, one-based row in the low three bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Token(pub u32);

impl Token {
  pub const NIL: Token = Token(0);

  pub const TYPE_TABLE: u8 = 0x02;
  pub const FIELD_TABLE: u8 = 0x04;
  pub const METHOD_TABLE: u8 = 0x06;
  pub const STRING_HEAP: u8 = 0x70;

  pub fn new(
    table: u8,
    row: u32,
  ) -> Self {
    debug_assert!(row <= 0x00FF_FFFF, "token row {} overflows", row);
    Token(((table as u32) << 24) | row)
  }

  pub fn table(self) -> u8 {
    (self.0 >> 24) as u8
  }

  pub fn row(self) -> u32 {
    self.0 & 0x00FF_FFFF
  }

  pub fn is_nil(self) -> bool {
    self.row() == 0
  }
}

impl std::fmt::Display for Token {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    write!(f, "0x{:08x}", self.0)
  }
}

/// Index of a declared local in the method's local signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LocalSlot(pub u16);

impl std::fmt::Display for LocalSlot {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    write!(f, "V_{}", self.0)
  }
}

/// Inline operand of an instruction.
///
/// `Target` and `Targets` only appear after realization, once branch labels have offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Operand {
  None,
  I4(i32),
  I8(i64),
  R8(OrderedFloat<f64>),
  Token(Token),
  Local(LocalSlot),
  Arg(u16),
  Target(u32),
  Targets(Vec<u32>),
}

impl std::fmt::Display for Operand {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    match self {
      Operand::None => Ok(()),
      Operand::I4(v) => write!(f, "{}", v),
      Operand::I8(v) => write!(f, "{}", v),
      Operand::R8(v) => write!(f, "{}", v),
      Operand::Token(t) => write!(f, "{}", t),
      Operand::Local(slot) => write!(f, "{}", slot),
      Operand::Arg(index) => write!(f, "{}", index),
      Operand::Target(offset) => write!(f, "IL_{:04x}", offset),
      Operand::Targets(offsets) => {
        let targets: Vec<_> = offsets.iter().map(|o| format!("IL_{:04x}", o)).collect();
        write!(f, "({})", targets.join(", "))
      },
    }
  }
}
