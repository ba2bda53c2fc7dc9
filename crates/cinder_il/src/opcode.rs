use serde::Serialize;

/// Stack-machine opcodes understood by the builder.
///
/// Branches are always encoded in their long (4-byte displacement) form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum OpCode {
  Nop,
  Dup,
  Pop,

  Ldarg0,
  Ldarg1,
  Ldarg2,
  Ldarg3,
  LdargS,
  Ldarg,
  LdargaS,
  StargS,
  Starg,

  Ldloc0,
  Ldloc1,
  Ldloc2,
  Ldloc3,
  LdlocS,
  Ldloc,
  Stloc0,
  Stloc1,
  Stloc2,
  Stloc3,
  StlocS,
  Stloc,
  LdlocaS,
  Ldloca,

  Ldnull,
  LdcI4M1,
  LdcI40,
  LdcI41,
  LdcI42,
  LdcI43,
  LdcI44,
  LdcI45,
  LdcI46,
  LdcI47,
  LdcI48,
  LdcI4S,
  LdcI4,
  LdcI8,
  LdcR8,
  Ldstr,

  Add,
  Sub,
  Mul,
  Div,
  DivUn,
  Rem,
  RemUn,
  And,
  Or,
  Xor,
  Shl,
  Shr,
  ShrUn,
  Neg,
  Not,

  Ceq,
  Cgt,
  CgtUn,
  Clt,
  CltUn,

  ConvI1,
  ConvI2,
  ConvI4,
  ConvI8,
  ConvU1,
  ConvU2,
  ConvU4,
  ConvU8,
  ConvR4,
  ConvR8,
  ConvRUn,
  ConvOvfI1,
  ConvOvfI2,
  ConvOvfI4,
  ConvOvfI8,
  ConvOvfU1,
  ConvOvfU2,
  ConvOvfU4,
  ConvOvfU8,

  Call,
  Callvirt,
  Newobj,
  Ldfld,
  Stfld,
  Ldsfld,
  Stsfld,
  Box,
  UnboxAny,
  Castclass,
  Isinst,
  Initobj,
  Ldtoken,

  Br,
  Brfalse,
  Brtrue,
  Beq,
  Bge,
  Bgt,
  Ble,
  Blt,
  BneUn,
  BgeUn,
  BgtUn,
  BleUn,
  BltUn,
  Switch,
  Leave,
  Endfinally,
  Ret,
  Throw,
  Rethrow,
}

impl OpCode {
  pub fn mnemonic(self) -> &'static str {
    match self {
      OpCode::Nop => "nop",
      OpCode::Dup => "dup",
      OpCode::Pop => "pop",
      OpCode::Ldarg0 => "ldarg.0",
      OpCode::Ldarg1 => "ldarg.1",
      OpCode::Ldarg2 => "ldarg.2",
      OpCode::Ldarg3 => "ldarg.3",
      OpCode::LdargS => "ldarg.s",
      OpCode::Ldarg => "ldarg",
      OpCode::LdargaS => "ldarga.s",
      OpCode::StargS => "starg.s",
      OpCode::Starg => "starg",
      OpCode::Ldloc0 => "ldloc.0",
      OpCode::Ldloc1 => "ldloc.1",
      OpCode::Ldloc2 => "ldloc.2",
      OpCode::Ldloc3 => "ldloc.3",
      OpCode::LdlocS => "ldloc.s",
      OpCode::Ldloc => "ldloc",
      OpCode::Stloc0 => "stloc.0",
      OpCode::Stloc1 => "stloc.1",
      OpCode::Stloc2 => "stloc.2",
      OpCode::Stloc3 => "stloc.3",
      OpCode::StlocS => "stloc.s",
      OpCode::Stloc => "stloc",
      OpCode::LdlocaS => "ldloca.s",
      OpCode::Ldloca => "ldloca",
      OpCode::Ldnull => "ldnull",
      OpCode::LdcI4M1 => "ldc.i4.m1",
      OpCode::LdcI40 => "ldc.i4.0",
      OpCode::LdcI41 => "ldc.i4.1",
      OpCode::LdcI42 => "ldc.i4.2",
      OpCode::LdcI43 => "ldc.i4.3",
      OpCode::LdcI44 => "ldc.i4.4",
      OpCode::LdcI45 => "ldc.i4.5",
      OpCode::LdcI46 => "ldc.i4.6",
      OpCode::LdcI47 => "ldc.i4.7",
      OpCode::LdcI48 => "ldc.i4.8",
      OpCode::LdcI4S => "ldc.i4.s",
      OpCode::LdcI4 => "ldc.i4",
      OpCode::LdcI8 => "ldc.i8",
      OpCode::LdcR8 => "ldc.r8",
      OpCode::Ldstr => "ldstr",
      OpCode::Add => "add",
      OpCode::Sub => "sub",
      OpCode::Mul => "mul",
      OpCode::Div => "div",
      OpCode::DivUn => "div.un",
      OpCode::Rem => "rem",
      OpCode::RemUn => "rem.un",
      OpCode::And => "and",
      OpCode::Or => "or",
      OpCode::Xor => "xor",
      OpCode::Shl => "shl",
      OpCode::Shr => "shr",
      OpCode::ShrUn => "shr.un",
      OpCode::Neg => "neg",
      OpCode::Not => "not",
      OpCode::Ceq => "ceq",
      OpCode::Cgt => "cgt",
      OpCode::CgtUn => "cgt.un",
      OpCode::Clt => "clt",
      OpCode::CltUn => "clt.un",
      OpCode::ConvI1 => "conv.i1",
      OpCode::ConvI2 => "conv.i2",
      OpCode::ConvI4 => "conv.i4",
      OpCode::ConvI8 => "conv.i8",
      OpCode::ConvU1 => "conv.u1",
      OpCode::ConvU2 => "conv.u2",
      OpCode::ConvU4 => "conv.u4",
      OpCode::ConvU8 => "conv.u8",
      OpCode::ConvR4 => "conv.r4",
      OpCode::ConvR8 => "conv.r8",
      OpCode::ConvRUn => "conv.r.un",
      OpCode::ConvOvfI1 => "conv.ovf.i1",
      OpCode::ConvOvfI2 => "conv.ovf.i2",
      OpCode::ConvOvfI4 => "conv.ovf.i4",
      OpCode::ConvOvfI8 => "conv.ovf.i8",
      OpCode::ConvOvfU1 => "conv.ovf.u1",
      OpCode::ConvOvfU2 => "conv.ovf.u2",
      OpCode::ConvOvfU4 => "conv.ovf.u4",
      OpCode::ConvOvfU8 => "conv.ovf.u8",
      OpCode::Call => "call",
      OpCode::Callvirt => "callvirt",
      OpCode::Newobj => "newobj",
      OpCode::Ldfld => "ldfld",
      OpCode::Stfld => "stfld",
      OpCode::Ldsfld => "ldsfld",
      OpCode::Stsfld => "stsfld",
      OpCode::Box => "box",
      OpCode::UnboxAny => "unbox.any",
      OpCode::Castclass => "castclass",
      OpCode::Isinst => "isinst",
      OpCode::Initobj => "initobj",
      OpCode::Ldtoken => "ldtoken",
      OpCode::Br => "br",
      OpCode::Brfalse => "brfalse",
      OpCode::Brtrue => "brtrue",
      OpCode::Beq => "beq",
      OpCode::Bge => "bge",
      OpCode::Bgt => "bgt",
      OpCode::Ble => "ble",
      OpCode::Blt => "blt",
      OpCode::BneUn => "bne.un",
      OpCode::BgeUn => "bge.un",
      OpCode::BgtUn => "bgt.un",
      OpCode::BleUn => "ble.un",
      OpCode::BltUn => "blt.un",
      OpCode::Switch => "switch",
      OpCode::Leave => "leave",
      OpCode::Endfinally => "endfinally",
      OpCode::Ret => "ret",
      OpCode::Throw => "throw",
      OpCode::Rethrow => "rethrow",
    }
  }

  /// Encoded size of the opcode itself. Two-byte opcodes carry the `0xFE` prefix.
  pub fn size(self) -> u32 {
    match self {
      OpCode::Ceq
      | OpCode::Cgt
      | OpCode::CgtUn
      | OpCode::Clt
      | OpCode::CltUn
      | OpCode::Ldarg
      | OpCode::Starg
      | OpCode::Ldloc
      | OpCode::Stloc
      | OpCode::Ldloca
      | OpCode::Initobj
      | OpCode::Rethrow => 2,
      _ => 1,
    }
  }

  /// Encoded size of the inline operand. `switch` adds four bytes per target on top of this.
  pub fn operand_size(self) -> u32 {
    match self {
      OpCode::LdargS | OpCode::LdargaS | OpCode::StargS | OpCode::LdlocS | OpCode::StlocS | OpCode::LdlocaS => 1,
      OpCode::LdcI4S => 1,
      OpCode::Ldarg | OpCode::Starg | OpCode::Ldloc | OpCode::Stloc | OpCode::Ldloca => 2,
      OpCode::LdcI4
      | OpCode::Ldstr
      | OpCode::Call
      | OpCode::Callvirt
      | OpCode::Newobj
      | OpCode::Ldfld
      | OpCode::Stfld
      | OpCode::Ldsfld
      | OpCode::Stsfld
      | OpCode::Box
      | OpCode::UnboxAny
      | OpCode::Castclass
      | OpCode::Isinst
      | OpCode::Initobj
      | OpCode::Ldtoken
      | OpCode::Switch => 4,
      OpCode::LdcI8 | OpCode::LdcR8 => 8,
      op if op.is_branch() => 4,
      _ => 0,
    }
  }

  /// Net stack effect, or `None` when it depends on a signature (`call`, `newobj`, `ret`).
  pub fn stack_delta(self) -> Option<i32> {
    let delta = match self {
      OpCode::Call | OpCode::Callvirt | OpCode::Newobj | OpCode::Ret => return None,

      OpCode::Nop
      | OpCode::Neg
      | OpCode::Not
      | OpCode::Ldfld
      | OpCode::Box
      | OpCode::UnboxAny
      | OpCode::Castclass
      | OpCode::Isinst
      | OpCode::Br
      | OpCode::Leave
      | OpCode::Endfinally
      | OpCode::Rethrow => 0,

      OpCode::ConvI1
      | OpCode::ConvI2
      | OpCode::ConvI4
      | OpCode::ConvI8
      | OpCode::ConvU1
      | OpCode::ConvU2
      | OpCode::ConvU4
      | OpCode::ConvU8
      | OpCode::ConvR4
      | OpCode::ConvR8
      | OpCode::ConvRUn
      | OpCode::ConvOvfI1
      | OpCode::ConvOvfI2
      | OpCode::ConvOvfI4
      | OpCode::ConvOvfI8
      | OpCode::ConvOvfU1
      | OpCode::ConvOvfU2
      | OpCode::ConvOvfU4
      | OpCode::ConvOvfU8 => 0,

      OpCode::Dup
      | OpCode::Ldarg0
      | OpCode::Ldarg1
      | OpCode::Ldarg2
      | OpCode::Ldarg3
      | OpCode::LdargS
      | OpCode::Ldarg
      | OpCode::LdargaS
      | OpCode::Ldloc0
      | OpCode::Ldloc1
      | OpCode::Ldloc2
      | OpCode::Ldloc3
      | OpCode::LdlocS
      | OpCode::Ldloc
      | OpCode::LdlocaS
      | OpCode::Ldloca
      | OpCode::Ldnull
      | OpCode::LdcI4M1
      | OpCode::LdcI40
      | OpCode::LdcI41
      | OpCode::LdcI42
      | OpCode::LdcI43
      | OpCode::LdcI44
      | OpCode::LdcI45
      | OpCode::LdcI46
      | OpCode::LdcI47
      | OpCode::LdcI48
      | OpCode::LdcI4S
      | OpCode::LdcI4
      | OpCode::LdcI8
      | OpCode::LdcR8
      | OpCode::Ldstr
      | OpCode::Ldsfld
      | OpCode::Ldtoken => 1,

      OpCode::Pop
      | OpCode::StargS
      | OpCode::Starg
      | OpCode::Stloc0
      | OpCode::Stloc1
      | OpCode::Stloc2
      | OpCode::Stloc3
      | OpCode::StlocS
      | OpCode::Stloc
      | OpCode::Add
      | OpCode::Sub
      | OpCode::Mul
      | OpCode::Div
      | OpCode::DivUn
      | OpCode::Rem
      | OpCode::RemUn
      | OpCode::And
      | OpCode::Or
      | OpCode::Xor
      | OpCode::Shl
      | OpCode::Shr
      | OpCode::ShrUn
      | OpCode::Ceq
      | OpCode::Cgt
      | OpCode::CgtUn
      | OpCode::Clt
      | OpCode::CltUn
      | OpCode::Stsfld
      | OpCode::Initobj
      | OpCode::Brfalse
      | OpCode::Brtrue
      | OpCode::Switch
      | OpCode::Throw => -1,

      OpCode::Stfld
      | OpCode::Beq
      | OpCode::Bge
      | OpCode::Bgt
      | OpCode::Ble
      | OpCode::Blt
      | OpCode::BneUn
      | OpCode::BgeUn
      | OpCode::BgtUn
      | OpCode::BleUn
      | OpCode::BltUn => -2,
    };
    Some(delta)
  }

  pub fn is_branch(self) -> bool {
    self == OpCode::Br || self == OpCode::Leave || self.is_conditional_branch()
  }

  pub fn is_conditional_branch(self) -> bool {
    matches!(
      self,
      OpCode::Brfalse
        | OpCode::Brtrue
        | OpCode::Beq
        | OpCode::Bge
        | OpCode::Bgt
        | OpCode::Ble
        | OpCode::Blt
        | OpCode::BneUn
        | OpCode::BgeUn
        | OpCode::BgtUn
        | OpCode::BleUn
        | OpCode::BltUn
    )
  }

  /// Opcodes that end a basic block. They go through the dedicated sink methods.
  pub fn is_control_transfer(self) -> bool {
    self.is_branch()
      || matches!(
        self,
        OpCode::Switch | OpCode::Endfinally | OpCode::Ret | OpCode::Throw | OpCode::Rethrow
      )
  }

  /// The branch taken exactly when `self` is not. The `.un` forms keep NaN operands on the
  /// opposite edge.
  pub fn inverted(self) -> OpCode {
    match self {
      OpCode::Brfalse => OpCode::Brtrue,
      OpCode::Brtrue => OpCode::Brfalse,
      OpCode::Beq => OpCode::BneUn,
      OpCode::BneUn => OpCode::Beq,
      OpCode::Bge => OpCode::BltUn,
      OpCode::BltUn => OpCode::Bge,
      OpCode::BgeUn => OpCode::Blt,
      OpCode::Blt => OpCode::BgeUn,
      OpCode::Bgt => OpCode::BleUn,
      OpCode::BleUn => OpCode::Bgt,
      OpCode::BgtUn => OpCode::Ble,
      OpCode::Ble => OpCode::BgtUn,
      other => panic!("{} is not a conditional branch", other.mnemonic()),
    }
  }
}

impl std::fmt::Display for OpCode {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    write!(f, "{}", self.mnemonic())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_inverted_is_an_involution() {
    let conditional = [
      OpCode::Brfalse,
      OpCode::Brtrue,
      OpCode::Beq,
      OpCode::Bge,
      OpCode::Bgt,
      OpCode::Ble,
      OpCode::Blt,
      OpCode::BneUn,
      OpCode::BgeUn,
      OpCode::BgtUn,
      OpCode::BleUn,
      OpCode::BltUn,
    ];

    for op in conditional {
      assert_eq!(op.inverted().inverted(), op, "{}", op);
      assert_eq!(op.inverted().stack_delta(), op.stack_delta());
    }
  }

  #[test]
  fn test_encoded_sizes() {
    assert_eq!(OpCode::Ceq.size() + OpCode::Ceq.operand_size(), 2);
    assert_eq!(OpCode::LdcI4S.size() + OpCode::LdcI4S.operand_size(), 2);
    assert_eq!(OpCode::Br.size() + OpCode::Br.operand_size(), 5);
    assert_eq!(OpCode::Ldloc.size() + OpCode::Ldloc.operand_size(), 4);
    assert_eq!(OpCode::LdcR8.operand_size(), 8);
  }
}
