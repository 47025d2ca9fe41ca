//! Signature blob encoding

use crate::error::PeResult;
use crate::writer::ByteWriter;
use fifth_il::{IlType, TypeRef};

/// Element type codes
mod element {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const I4: u8 = 0x08;
    pub const I8: u8 = 0x0A;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
}

const DEFAULT: u8 = 0x00;
const HASTHIS: u8 = 0x20;
const FIELD: u8 = 0x06;
const LOCAL_SIG: u8 = 0x07;

/// Source of `TypeDefOrRef` coded indexes for named types
pub trait TypeCoder {
    /// Coded index of a named type
    fn type_def_or_ref(&mut self, ty: &TypeRef) -> PeResult<u32>;
}

/// Append the encoding of `ty`
pub fn encode_type(ty: &IlType, w: &mut ByteWriter, coder: &mut impl TypeCoder) -> PeResult<()> {
    match ty {
        IlType::Void => w.emit_u8(element::VOID),
        IlType::Bool => w.emit_u8(element::BOOLEAN),
        IlType::Char => w.emit_u8(element::CHAR),
        IlType::I1 => w.emit_u8(element::I1),
        IlType::U1 => w.emit_u8(element::U1),
        IlType::I2 => w.emit_u8(element::I2),
        IlType::I4 => w.emit_u8(element::I4),
        IlType::I8 => w.emit_u8(element::I8),
        IlType::R4 => w.emit_u8(element::R4),
        IlType::R8 => w.emit_u8(element::R8),
        IlType::String => w.emit_u8(element::STRING),
        IlType::Object => w.emit_u8(element::OBJECT),
        IlType::Class(named) => {
            w.emit_u8(element::CLASS);
            w.emit_compressed_u32(coder.type_def_or_ref(named)?);
        }
        IlType::ValueType(named) => {
            w.emit_u8(element::VALUETYPE);
            w.emit_compressed_u32(coder.type_def_or_ref(named)?);
        }
        IlType::SzArray(inner) => {
            w.emit_u8(element::SZARRAY);
            encode_type(inner, w, coder)?;
        }
    }
    Ok(())
}

/// `MethodDefSig`/`MethodRefSig`
pub fn method_signature(
    has_this: bool,
    return_type: &IlType,
    params: &[IlType],
    coder: &mut impl TypeCoder,
) -> PeResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.emit_u8(if has_this { HASTHIS } else { DEFAULT });
    w.emit_compressed_u32(params.len() as u32);
    encode_type(return_type, &mut w, coder)?;
    for param in params {
        encode_type(param, &mut w, coder)?;
    }
    Ok(w.into_bytes())
}

/// `FieldSig`
pub fn field_signature(ty: &IlType, coder: &mut impl TypeCoder) -> PeResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.emit_u8(FIELD);
    encode_type(ty, &mut w, coder)?;
    Ok(w.into_bytes())
}

/// `LocalVarSig`
pub fn local_signature<'a>(
    locals: impl ExactSizeIterator<Item = &'a IlType>,
    coder: &mut impl TypeCoder,
) -> PeResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.emit_u8(LOCAL_SIG);
    w.emit_compressed_u32(locals.len() as u32);
    for ty in locals {
        encode_type(ty, &mut w, coder)?;
    }
    Ok(w.into_bytes())
}

/// `TypeSpec` blob
pub fn type_spec_signature(ty: &IlType, coder: &mut impl TypeCoder) -> PeResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    encode_type(ty, &mut w, coder)?;
    Ok(w.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every named type is TypeRef row 1
    struct FixedCoder;

    impl TypeCoder for FixedCoder {
        fn type_def_or_ref(&mut self, _ty: &TypeRef) -> PeResult<u32> {
            Ok(0x05)
        }
    }

    #[test]
    fn test_static_method_signature() {
        let sig = method_signature(false, &IlType::R8, &[IlType::R8, IlType::R8], &mut FixedCoder)
            .unwrap();
        assert_eq!(sig, vec![0x00, 0x02, 0x0D, 0x0D, 0x0D]);
    }

    #[test]
    fn test_instance_ctor_signature() {
        let sig = method_signature(true, &IlType::Void, &[], &mut FixedCoder).unwrap();
        assert_eq!(sig, vec![0x20, 0x00, 0x01]);
    }

    #[test]
    fn test_named_and_array_types() {
        let person = IlType::Class(TypeRef::local("Person"));
        let sig = field_signature(&person, &mut FixedCoder).unwrap();
        assert_eq!(sig, vec![0x06, 0x12, 0x05]);

        let args = IlType::String.array_of();
        let locals = [IlType::I4, args];
        let sig = local_signature(locals.iter(), &mut FixedCoder).unwrap();
        assert_eq!(sig, vec![0x07, 0x02, 0x08, 0x1D, 0x0E]);
    }
}
