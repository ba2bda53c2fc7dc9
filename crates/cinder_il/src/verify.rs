use std::collections::HashMap;

use crate::{HandlerKind, OpCode, Operand, RealizedBody};

/// Errors found while checking a realized body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
  /// An instruction pops more values than the stack holds.
  StackUnderflow { offset: u32 },

  /// Two paths reach the same instruction with different stack heights.
  StackMismatch { offset: u32, expected: i32, actual: i32 },

  /// A branch lands in the middle of an instruction or outside the body.
  InvalidBranchTarget { offset: u32, target: u32 },

  /// `ret` executed with a stack that does not match the signature.
  ReturnStackHeight { offset: u32, height: i32 },

  /// The simulated stack grows past the declared `.maxstack`.
  MaxStackExceeded { offset: u32, height: i32, max_stack: u32 },

  /// Control runs past the last instruction.
  FallsOffEnd { offset: u32 },

  /// `leave` outside any protected region or handler.
  LeaveOutsideRegion { offset: u32 },
}

pub type VerifyResult = Result<(), Vec<VerifyError>>;

/// Abstract interpretation of stack heights over a realized body.
pub struct BodyVerifier<'a> {
  body: &'a RealizedBody,
  returns_value: bool,
  index_of: HashMap<u32, usize>,
  heights: Vec<Option<i32>>,
  errors: Vec<VerifyError>,
}

impl<'a> BodyVerifier<'a> {
  pub fn new(
    body: &'a RealizedBody,
    returns_value: bool,
  ) -> Self {
    let index_of = body
      .instructions
      .iter()
      .enumerate()
      .map(|(index, instruction)| (instruction.offset, index))
      .collect();

    Self {
      body,
      returns_value,
      index_of,
      heights: vec![None; body.instructions.len()],
      errors: Vec::new(),
    }
  }

  pub fn verify(mut self) -> VerifyResult {
    let mut work: Vec<(usize, i32)> = Vec::new();

    if !self.body.instructions.is_empty() {
      work.push((0, 0));
    }

    for region in &self.body.exception_regions {
      let height = match region.kind {
        HandlerKind::Catch(_) => 1,
        HandlerKind::Finally => 0,
      };
      if let Some(&index) = self.index_of.get(&region.handler_start) {
        work.push((index, height));
      }
    }

    while let Some((index, height)) = work.pop() {
      match self.heights[index] {
        Some(expected) if expected != height => {
          self.errors.push(VerifyError::StackMismatch {
            offset: self.body.instructions[index].offset,
            expected,
            actual: height,
          });
          continue;
        },
        Some(_) => continue,
        None => self.heights[index] = Some(height),
      }

      work.extend(self.step(index, height));
    }

    if self.errors.is_empty() {
      Ok(())
    } else {
      Err(self.errors)
    }
  }

  /// Checks one instruction and returns its successors with their entry heights.
  fn step(
    &mut self,
    index: usize,
    height: i32,
  ) -> Vec<(usize, i32)> {
    let instruction = &self.body.instructions[index];
    let offset = instruction.offset;
    let after = height + instruction.stack_delta;

    if after < 0 {
      self.errors.push(VerifyError::StackUnderflow { offset });
      return Vec::new();
    }

    if after > self.body.max_stack as i32 {
      self.errors.push(VerifyError::MaxStackExceeded {
        offset,
        height: after,
        max_stack: self.body.max_stack,
      });
    }

    match instruction.opcode {
      OpCode::Ret => {
        let expected = i32::from(self.returns_value);
        if height != expected {
          self.errors.push(VerifyError::ReturnStackHeight { offset, height });
        }
        Vec::new()
      },
      OpCode::Throw | OpCode::Rethrow | OpCode::Endfinally => Vec::new(),
      OpCode::Br => self.targets(offset, &instruction.operand, after),
      OpCode::Leave => {
        if !self.in_region(offset) {
          self.errors.push(VerifyError::LeaveOutsideRegion { offset });
        }
        self.targets(offset, &instruction.operand, 0)
      },
      OpCode::Switch => {
        let mut next = self.targets(offset, &instruction.operand, after);
        next.extend(self.next(index, after));
        next
      },
      opcode if opcode.is_conditional_branch() => {
        let mut next = self.targets(offset, &instruction.operand, after);
        next.extend(self.next(index, after));
        next
      },
      _ => self.next(index, after).into_iter().collect(),
    }
  }

  fn next(
    &mut self,
    index: usize,
    height: i32,
  ) -> Option<(usize, i32)> {
    if index + 1 < self.body.instructions.len() {
      Some((index + 1, height))
    } else {
      self.errors.push(VerifyError::FallsOffEnd {
        offset: self.body.instructions[index].offset,
      });
      None
    }
  }

  fn targets(
    &mut self,
    offset: u32,
    operand: &Operand,
    height: i32,
  ) -> Vec<(usize, i32)> {
    let targets = match operand {
      Operand::Target(target) => vec![*target],
      Operand::Targets(targets) => targets.clone(),
      _ => Vec::new(),
    };

    let mut out = Vec::new();
    for target in targets {
      match self.index_of.get(&target) {
        Some(&index) => out.push((index, height)),
        None => self.errors.push(VerifyError::InvalidBranchTarget { offset, target }),
      }
    }
    out
  }

  fn in_region(
    &self,
    offset: u32,
  ) -> bool {
    self.body.exception_regions.iter().any(|r| {
      (r.try_start..r.try_end).contains(&offset) || (r.handler_start..r.handler_end).contains(&offset)
    })
  }
}

pub fn verify_body(
  body: &RealizedBody,
  returns_value: bool,
) -> VerifyResult {
  BodyVerifier::new(body, returns_value).verify()
}
