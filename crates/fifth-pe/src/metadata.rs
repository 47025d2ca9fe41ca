//! Metadata construction
//!
//! `MetadataBuilder` owns the heaps and tables of one assembly. Definitions
//! are registered up front by [`MetadataBuilder::define`]; references to
//! imported types and members are interned lazily as method bodies ask for
//! their tokens.

use crate::body::TokenResolver;
use crate::error::{PeError, PeResult};
use crate::heaps::{BlobHeap, GuidHeap, StringHeap, UserStringHeap};
use crate::signature::{self, TypeCoder};
use crate::tables::{
    user_string_token, AssemblyRefRow, AssemblyRow, CodedIndex, FieldRow, HeapSizes,
    MemberRefRow, MethodDefRow, ModuleRow, ParamRow, TableId, Tables, TypeDefRow, TypeRefRow,
};
use crate::writer::ByteWriter;
use fifth_il::{AssemblyIr, FieldRef, IlType, LocalIr, MethodIr, MethodKind, MethodRef, TypeRef};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

const METADATA_SIGNATURE: u32 = 0x424A_5342;
const RUNTIME_VERSION: &str = "v4.0.30319";

mod type_flags {
    pub const PUBLIC: u32 = 0x0000_0001;
    pub const ABSTRACT: u32 = 0x0000_0080;
    pub const SEALED: u32 = 0x0000_0100;
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
}

mod member_flags {
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const HIDE_BY_SIG: u16 = 0x0080;
    pub const SPECIAL_NAME: u16 = 0x0800;
    pub const RT_SPECIAL_NAME: u16 = 0x1000;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    owner: TypeRef,
    name: String,
    params: Vec<IlType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FieldKey {
    owner: TypeRef,
    name: String,
}

/// Heaps and tables for one assembly
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    strings: StringHeap,
    user_strings: UserStringHeap,
    blobs: BlobHeap,
    guids: GuidHeap,
    tables: Tables,
    assembly_refs: FxHashMap<String, u32>,
    type_defs: FxHashMap<TypeRef, u32>,
    type_refs: FxHashMap<TypeRef, u32>,
    type_specs: FxHashMap<u32, u32>,
    member_refs: FxHashMap<MemberRefRow, u32>,
    method_defs: FxHashMap<MethodKey, u32>,
    field_defs: FxHashMap<FieldKey, u32>,
    local_sigs: FxHashMap<u32, u32>,
    entry_point: Option<u32>,
}

impl MetadataBuilder {
    /// Register the module, assembly, references and every definition of `assembly`
    pub fn define(assembly: &AssemblyIr) -> PeResult<Self> {
        let mut builder = Self::default();

        let module_name = builder.strings.intern(&format!("{}.exe", assembly.name));
        let mvid = builder.guids.add(module_version_id(assembly));
        builder.tables.module.push(ModuleRow {
            name: module_name,
            mvid,
        });
        let name = builder.strings.intern(&assembly.name);
        builder.tables.assembly.push(AssemblyRow {
            version: assembly.version,
            name,
        });

        for reference in &assembly.references {
            let token = reference
                .public_key_token
                .map(|token| builder.blobs.intern(&token))
                .unwrap_or(0);
            let name = builder.strings.intern(&reference.name);
            builder.tables.assembly_refs.push(AssemblyRefRow {
                version: reference.version,
                public_key_or_token: token,
                name,
            });
            let row = builder.tables.assembly_refs.len() as u32;
            builder.assembly_refs.insert(reference.name.clone(), row);
        }

        // <Module> owns nothing
        let module_type = builder.strings.intern("<Module>");
        builder.tables.type_defs.push(TypeDefRow {
            flags: 0,
            name: module_type,
            namespace: 0,
            extends: 0,
            field_list: 1,
            method_list: 1,
        });

        // Rows are known before any signature can mention a local type
        for (i, ty) in assembly.types.iter().enumerate() {
            builder.type_defs.insert(ty.type_ref(), i as u32 + 2);
            for method in &ty.methods {
                let row = builder.method_defs.len() as u32 + 1;
                builder.method_defs.insert(method_key(&ty.type_ref(), method), row);
            }
            for field in &ty.fields {
                let row = builder.field_defs.len() as u32 + 1;
                builder.field_defs.insert(
                    FieldKey {
                        owner: ty.type_ref(),
                        name: field.name.clone(),
                    },
                    row,
                );
            }
        }

        for ty in &assembly.types {
            let mut flags = type_flags::PUBLIC | type_flags::BEFORE_FIELD_INIT;
            if ty.is_static {
                flags |= type_flags::ABSTRACT | type_flags::SEALED;
            }
            let extends = builder.type_def_or_ref(&ty.base)?;
            let name = builder.strings.intern(&ty.name);
            let namespace = builder.strings.intern(&ty.namespace);
            builder.tables.type_defs.push(TypeDefRow {
                flags,
                name,
                namespace,
                extends,
                field_list: builder.tables.fields.len() as u32 + 1,
                method_list: builder.tables.methods.len() as u32 + 1,
            });

            for field in &ty.fields {
                let mut flags = member_flags::PUBLIC;
                if field.is_static {
                    flags |= member_flags::STATIC;
                }
                let signature = signature::field_signature(&field.ty, &mut builder)?;
                let signature = builder.blobs.intern(&signature);
                let name = builder.strings.intern(&field.name);
                builder.tables.fields.push(FieldRow {
                    flags,
                    name,
                    signature,
                });
            }

            for method in &ty.methods {
                builder.define_method(method)?;
            }
        }

        tracing::debug!(
            types = assembly.types.len(),
            methods = builder.tables.methods.len(),
            fields = builder.tables.fields.len(),
            "defined metadata"
        );
        Ok(builder)
    }

    fn define_method(&mut self, method: &MethodIr) -> PeResult<()> {
        let mut flags = member_flags::PUBLIC | member_flags::HIDE_BY_SIG;
        match method.kind {
            MethodKind::Static => flags |= member_flags::STATIC,
            MethodKind::Instance => {}
            MethodKind::Constructor => {
                flags |= member_flags::SPECIAL_NAME | member_flags::RT_SPECIAL_NAME
            }
        }
        let params: Vec<IlType> = method.params.iter().map(|p| p.ty.clone()).collect();
        let signature =
            signature::method_signature(method.has_this(), &method.return_type, &params, self)?;
        let signature = self.blobs.intern(&signature);
        let name = self.strings.intern(&method.name);
        let param_list = self.tables.params.len() as u32 + 1;
        self.tables.methods.push(MethodDefRow {
            rva: 0,
            impl_flags: 0,
            flags,
            name,
            signature,
            param_list,
        });
        if method.is_entry_point {
            self.entry_point = Some(self.tables.methods.len() as u32);
        }
        for (i, param) in method.params.iter().enumerate() {
            let name = self.strings.intern(&param.name);
            self.tables.params.push(ParamRow {
                flags: 0,
                sequence: i as u16 + 1,
                name,
            });
        }
        Ok(())
    }

    /// MethodDef token of the entry point
    pub fn entry_point_token(&self) -> PeResult<u32> {
        self.entry_point
            .map(|row| TableId::MethodDef.token(row))
            .ok_or(PeError::NoEntryPoint)
    }

    fn type_ref_row(&mut self, ty: &TypeRef) -> PeResult<u32> {
        if let Some(&row) = self.type_refs.get(ty) {
            return Ok(row);
        }
        let assembly = ty.assembly.as_deref().unwrap_or_default();
        let Some(&scope_row) = self.assembly_refs.get(assembly) else {
            return Err(PeError::UnknownAssembly {
                ty: ty.full_name(),
                assembly: assembly.to_string(),
            });
        };
        let name = self.strings.intern(&ty.name);
        let namespace = self.strings.intern(&ty.namespace);
        self.tables.type_refs.push(TypeRefRow {
            scope: CodedIndex::ResolutionScope.encode(TableId::AssemblyRef, scope_row),
            name,
            namespace,
        });
        let row = self.tables.type_refs.len() as u32;
        self.type_refs.insert(ty.clone(), row);
        Ok(row)
    }

    /// Table and row of a named type
    fn named_type(&mut self, ty: &TypeRef) -> PeResult<(TableId, u32)> {
        if ty.assembly.is_none() {
            self.type_defs
                .get(ty)
                .map(|&row| (TableId::TypeDef, row))
                .ok_or_else(|| PeError::UnknownMember(ty.full_name()))
        } else {
            Ok((TableId::TypeRef, self.type_ref_row(ty)?))
        }
    }

    fn type_spec_row(&mut self, ty: &IlType) -> PeResult<u32> {
        let blob = signature::type_spec_signature(ty, self)?;
        let blob = self.blobs.intern(&blob);
        if let Some(&row) = self.type_specs.get(&blob) {
            return Ok(row);
        }
        self.tables.type_specs.push(blob);
        let row = self.tables.type_specs.len() as u32;
        self.type_specs.insert(blob, row);
        Ok(row)
    }

    fn member_ref(&mut self, owner: &TypeRef, name: &str, signature: Vec<u8>) -> PeResult<u32> {
        let (table, row) = self.named_type(owner)?;
        let row = MemberRefRow {
            class: CodedIndex::MemberRefParent.encode(table, row),
            name: self.strings.intern(name),
            signature: self.blobs.intern(&signature),
        };
        if let Some(&existing) = self.member_refs.get(&row) {
            return Ok(TableId::MemberRef.token(existing));
        }
        self.tables.member_refs.push(row.clone());
        let index = self.tables.member_refs.len() as u32;
        self.member_refs.insert(row, index);
        Ok(TableId::MemberRef.token(index))
    }

    /// Record the body RVA of every method, in definition order
    pub fn set_method_rvas(&mut self, rvas: &[u32]) {
        for (row, &rva) in self.tables.methods.iter_mut().zip(rvas) {
            row.rva = rva;
        }
    }

    /// Serialize the metadata root and its five streams
    pub fn finish(&self) -> Vec<u8> {
        let heaps = HeapSizes {
            wide_strings: self.strings.is_wide(),
            wide_guids: self.guids.is_wide(),
            wide_blobs: self.blobs.is_wide(),
        };
        let streams: [(&str, Vec<u8>); 5] = [
            ("#~", self.tables.finish(heaps)),
            ("#Strings", self.strings.finish()),
            ("#US", self.user_strings.finish()),
            ("#GUID", self.guids.finish()),
            ("#Blob", self.blobs.finish()),
        ];

        let mut w = ByteWriter::new();
        w.emit_u32(METADATA_SIGNATURE);
        w.emit_u16(1);
        w.emit_u16(1);
        w.emit_u32(0);
        let version_len = crate::writer::align_up(RUNTIME_VERSION.len() + 1, 4);
        w.emit_u32(version_len as u32);
        let version_start = w.offset();
        w.emit_bytes(RUNTIME_VERSION.as_bytes());
        w.pad_to(version_start + version_len);
        w.emit_u16(0);
        w.emit_u16(streams.len() as u16);

        let headers_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + crate::writer::align_up(name.len() + 1, 4))
            .sum();
        let mut offset = w.offset() + headers_len;
        for (name, data) in &streams {
            w.emit_u32(offset as u32);
            w.emit_u32(data.len() as u32);
            let start = w.offset();
            w.emit_bytes(name.as_bytes());
            w.pad_to(start + crate::writer::align_up(name.len() + 1, 4));
            offset += data.len();
        }
        for (_, data) in &streams {
            w.emit_bytes(data);
        }
        w.into_bytes()
    }
}

fn method_key(owner: &TypeRef, method: &MethodIr) -> MethodKey {
    MethodKey {
        owner: owner.clone(),
        name: method.name.clone(),
        params: method.params.iter().map(|p| p.ty.clone()).collect(),
    }
}

/// Name-derived, so identical inputs produce identical images
fn module_version_id(assembly: &AssemblyIr) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(assembly.name.as_bytes());
    for ty in &assembly.types {
        hasher.update(ty.type_ref().full_name().as_bytes());
        for method in &ty.methods {
            hasher.update(method.name.as_bytes());
        }
    }
    let digest = hasher.finalize();
    let mut guid = [0u8; 16];
    guid.copy_from_slice(&digest[..16]);
    guid[7] = (guid[7] & 0x0F) | 0x40;
    guid[8] = (guid[8] & 0x3F) | 0x80;
    guid
}

/// Runtime type standing in for a primitive in `newarr`/`stelem` operands
fn primitive_type_name(ty: &IlType) -> Option<&'static str> {
    Some(match ty {
        IlType::Bool => "System.Boolean",
        IlType::Char => "System.Char",
        IlType::I1 => "System.SByte",
        IlType::U1 => "System.Byte",
        IlType::I2 => "System.Int16",
        IlType::I4 => "System.Int32",
        IlType::I8 => "System.Int64",
        IlType::R4 => "System.Single",
        IlType::R8 => "System.Double",
        IlType::String => "System.String",
        IlType::Object => "System.Object",
        _ => return None,
    })
}

impl TypeCoder for MetadataBuilder {
    fn type_def_or_ref(&mut self, ty: &TypeRef) -> PeResult<u32> {
        let (table, row) = self.named_type(ty)?;
        Ok(CodedIndex::TypeDefOrRef.encode(table, row))
    }
}

impl TokenResolver for MetadataBuilder {
    fn method_token(&mut self, method: &MethodRef) -> PeResult<u32> {
        if method.owner.assembly.is_none() {
            let key = MethodKey {
                owner: method.owner.clone(),
                name: method.name.clone(),
                params: method.params.clone(),
            };
            return self
                .method_defs
                .get(&key)
                .map(|&row| TableId::MethodDef.token(row))
                .ok_or_else(|| PeError::UnknownMember(method.to_string()));
        }
        let signature =
            signature::method_signature(method.has_this, &method.return_type, &method.params, self)?;
        self.member_ref(&method.owner, &method.name, signature)
    }

    fn field_token(&mut self, field: &FieldRef) -> PeResult<u32> {
        if field.owner.assembly.is_none() {
            let key = FieldKey {
                owner: field.owner.clone(),
                name: field.name.clone(),
            };
            return self
                .field_defs
                .get(&key)
                .map(|&row| TableId::Field.token(row))
                .ok_or_else(|| PeError::UnknownMember(field.to_string()));
        }
        let signature = signature::field_signature(&field.ty, self)?;
        self.member_ref(&field.owner, &field.name, signature)
    }

    fn type_token(&mut self, ty: &IlType) -> PeResult<u32> {
        if let Some(named) = ty.type_ref() {
            let (table, row) = self.named_type(named)?;
            return Ok(table.token(row));
        }
        if let Some(name) = primitive_type_name(ty) {
            let row = self.type_ref_row(&TypeRef::system(name))?;
            return Ok(TableId::TypeRef.token(row));
        }
        let row = self.type_spec_row(ty)?;
        Ok(TableId::TypeSpec.token(row))
    }

    fn string_token(&mut self, text: &str) -> u32 {
        user_string_token(self.user_strings.intern(text))
    }

    fn local_sig_token(&mut self, locals: &[LocalIr]) -> PeResult<u32> {
        let blob = signature::local_signature(locals.iter().map(|l| &l.ty), self)?;
        let blob = self.blobs.intern(&blob);
        if let Some(&row) = self.local_sigs.get(&blob) {
            return Ok(TableId::StandAloneSig.token(row));
        }
        self.tables.stand_alone_sigs.push(blob);
        let row = self.tables.stand_alone_sigs.len() as u32;
        self.local_sigs.insert(blob, row);
        Ok(TableId::StandAloneSig.token(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_il::{AssemblyRefIr, FieldIr, InstructionSequence, ParamIr, TypeIr};
    use pretty_assertions::assert_eq;

    fn sample() -> AssemblyIr {
        let mut assembly = AssemblyIr::new("app");
        assembly.add_reference(AssemblyRefIr::runtime("System.Console"));
        let person = TypeRef::local("Person");
        assembly.types.push(TypeIr {
            namespace: String::new(),
            name: "Person".into(),
            base: TypeRef::system("System.Object"),
            is_static: false,
            fields: vec![FieldIr {
                name: "age".into(),
                ty: IlType::I4,
                is_static: false,
            }],
            methods: vec![MethodIr {
                name: ".ctor".into(),
                kind: MethodKind::Constructor,
                params: vec![],
                return_type: IlType::Void,
                locals: vec![],
                body: InstructionSequence::new(),
                is_entry_point: false,
            }],
        });
        assembly.types.push(TypeIr {
            namespace: String::new(),
            name: "Program".into(),
            base: TypeRef::system("System.Object"),
            is_static: true,
            fields: vec![],
            methods: vec![MethodIr {
                name: "Main".into(),
                kind: MethodKind::Static,
                params: vec![ParamIr {
                    name: "p".into(),
                    ty: IlType::Class(person),
                }],
                return_type: IlType::I4,
                locals: vec![],
                body: InstructionSequence::new(),
                is_entry_point: true,
            }],
        });
        assembly
    }

    #[test]
    fn test_definitions_resolve_to_def_tokens() {
        let mut md = MetadataBuilder::define(&sample()).unwrap();
        assert_eq!(md.entry_point_token().unwrap(), 0x0600_0002);
        let ctor = MethodRef::default_ctor(TypeRef::local("Person"));
        assert_eq!(md.method_token(&ctor).unwrap(), 0x0600_0001);
        let age = FieldRef {
            owner: TypeRef::local("Person"),
            name: "age".into(),
            ty: IlType::I4,
        };
        assert_eq!(md.field_token(&age).unwrap(), 0x0400_0001);
        assert_eq!(md.type_token(&IlType::Class(TypeRef::local("Program"))).unwrap(), 0x0200_0003);
        assert_eq!(md.tables.params.len(), 1);
        assert_eq!(md.tables.type_defs[2].flags, 0x0010_0181);
        assert_eq!(md.tables.type_defs[1].flags, 0x0010_0001);
    }

    #[test]
    fn test_member_refs_are_interned() {
        let mut md = MetadataBuilder::define(&sample()).unwrap();
        let write_line = MethodRef::static_method(
            TypeRef::external("System.Console", "System.Console"),
            "WriteLine",
            vec![IlType::String],
            IlType::Void,
        );
        let first = md.method_token(&write_line).unwrap();
        assert_eq!(md.method_token(&write_line).unwrap(), first);
        assert_eq!(first >> 24, 0x0A);
        assert_eq!(md.tables.member_refs.len(), 1);
    }

    #[test]
    fn test_unreferenced_assembly_is_an_error() {
        let mut md = MetadataBuilder::define(&sample()).unwrap();
        let missing = MethodRef::static_method(
            TypeRef::external("Fifth.System", "Fifth.System.IO"),
            "print",
            vec![IlType::String],
            IlType::Void,
        );
        assert!(matches!(
            md.method_token(&missing),
            Err(PeError::UnknownAssembly { .. })
        ));
    }

    #[test]
    fn test_array_and_primitive_type_tokens() {
        let mut md = MetadataBuilder::define(&sample()).unwrap();
        let int32 = md.type_token(&IlType::I4).unwrap();
        assert_eq!(int32 >> 24, 0x01);
        let nested = md.type_token(&IlType::I4.array_of()).unwrap();
        assert_eq!(nested >> 24, 0x1B);
        assert_eq!(md.type_token(&IlType::I4.array_of()).unwrap(), nested);
    }

    #[test]
    fn test_metadata_root() {
        let md = MetadataBuilder::define(&sample()).unwrap();
        let bytes = md.finish();
        assert_eq!(&bytes[..4], b"BSJB");
        assert_eq!(&bytes[16..26], RUNTIME_VERSION.as_bytes());
        assert_eq!(u16::from_le_bytes([bytes[30], bytes[31]]), 5);
        assert_eq!(&bytes[40..43], b"#~\0");
    }

    #[test]
    fn test_mvid_is_deterministic() {
        assert_eq!(module_version_id(&sample()), module_version_id(&sample()));
        assert_eq!(module_version_id(&sample())[7] >> 4, 4);
    }
}
