//! CIL opcode values
//!
//! Two-byte opcodes carry the `0xFE` prefix in their high byte.

use crate::writer::ByteWriter;

/// CIL opcodes used by the body encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs, non_camel_case_types)]
pub enum Opcode {
    Nop = 0x00,
    Ldarg0 = 0x02,
    Ldarg1 = 0x03,
    Ldarg2 = 0x04,
    Ldarg3 = 0x05,
    Ldloc0 = 0x06,
    Ldloc1 = 0x07,
    Ldloc2 = 0x08,
    Ldloc3 = 0x09,
    Stloc0 = 0x0A,
    Stloc1 = 0x0B,
    Stloc2 = 0x0C,
    Stloc3 = 0x0D,
    LdargS = 0x0E,
    StargS = 0x10,
    LdlocS = 0x11,
    StlocS = 0x13,
    Ldnull = 0x14,
    LdcI4M1 = 0x15,
    LdcI4_0 = 0x16,
    LdcI4_1 = 0x17,
    LdcI4_2 = 0x18,
    LdcI4_3 = 0x19,
    LdcI4_4 = 0x1A,
    LdcI4_5 = 0x1B,
    LdcI4_6 = 0x1C,
    LdcI4_7 = 0x1D,
    LdcI4_8 = 0x1E,
    LdcI4S = 0x1F,
    LdcI4 = 0x20,
    LdcI8 = 0x21,
    LdcR4 = 0x22,
    LdcR8 = 0x23,
    Dup = 0x25,
    Pop = 0x26,
    Call = 0x28,
    Ret = 0x2A,
    Br = 0x38,
    Brfalse = 0x39,
    Brtrue = 0x3A,
    Add = 0x58,
    Sub = 0x59,
    Mul = 0x5A,
    Div = 0x5B,
    Rem = 0x5D,
    And = 0x5F,
    Or = 0x60,
    Xor = 0x61,
    Shl = 0x62,
    Shr = 0x63,
    Neg = 0x65,
    Not = 0x66,
    ConvI4 = 0x69,
    ConvI8 = 0x6A,
    ConvR4 = 0x6B,
    ConvR8 = 0x6C,
    Callvirt = 0x6F,
    Ldstr = 0x72,
    Newobj = 0x73,
    Ldfld = 0x7B,
    Stfld = 0x7D,
    Ldsfld = 0x7E,
    Stsfld = 0x80,
    Box = 0x8C,
    Newarr = 0x8D,
    StelemI1 = 0x9C,
    StelemI2 = 0x9D,
    StelemI4 = 0x9E,
    StelemI8 = 0x9F,
    StelemR4 = 0xA0,
    StelemR8 = 0xA1,
    StelemRef = 0xA2,
    Stelem = 0xA4,
    Ceq = 0xFE01,
    Cgt = 0xFE02,
    Clt = 0xFE04,
    Ldarg = 0xFE09,
    Starg = 0xFE0B,
    Ldloc = 0xFE0C,
    Stloc = 0xFE0E,
}

impl Opcode {
    /// Opcode value
    pub fn value(self) -> u16 {
        self as u16
    }

    /// Encoded size in bytes, operands excluded
    pub fn size(self) -> usize {
        if self.value() > 0xFF {
            2
        } else {
            1
        }
    }

    /// Write the opcode bytes
    pub fn encode(self, writer: &mut ByteWriter) {
        let value = self.value();
        if value > 0xFF {
            writer.emit_u8(0xFE);
            writer.emit_u8((value & 0xFF) as u8);
        } else {
            writer.emit_u8(value as u8);
        }
    }

    /// `ldc.i4.<n>` for 0..=8
    pub fn ldc_i4_short(n: i32) -> Option<Opcode> {
        const SHORT: [Opcode; 9] = [
            Opcode::LdcI4_0,
            Opcode::LdcI4_1,
            Opcode::LdcI4_2,
            Opcode::LdcI4_3,
            Opcode::LdcI4_4,
            Opcode::LdcI4_5,
            Opcode::LdcI4_6,
            Opcode::LdcI4_7,
            Opcode::LdcI4_8,
        ];
        usize::try_from(n).ok().and_then(|i| SHORT.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_byte_encoding() {
        let mut w = ByteWriter::new();
        Opcode::Ceq.encode(&mut w);
        Opcode::Ret.encode(&mut w);
        assert_eq!(w.buffer(), &[0xFE, 0x01, 0x2A]);
        assert_eq!(Opcode::Clt.size(), 2);
    }

    #[test]
    fn test_short_constants() {
        assert_eq!(Opcode::ldc_i4_short(0), Some(Opcode::LdcI4_0));
        assert_eq!(Opcode::ldc_i4_short(8).map(Opcode::value), Some(0x1E));
        assert_eq!(Opcode::ldc_i4_short(9), None);
        assert_eq!(Opcode::ldc_i4_short(-1), None);
    }
}
