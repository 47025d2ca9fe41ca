//! Metadata tables and the `#~` stream layout

use crate::writer::ByteWriter;

/// Table numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TableId {
    /// Module
    Module = 0x00,
    /// TypeRef
    TypeRef = 0x01,
    /// TypeDef
    TypeDef = 0x02,
    /// Field
    Field = 0x04,
    /// MethodDef
    MethodDef = 0x06,
    /// Param
    Param = 0x08,
    /// MemberRef
    MemberRef = 0x0A,
    /// StandAloneSig
    StandAloneSig = 0x11,
    /// TypeSpec
    TypeSpec = 0x1B,
    /// Assembly
    Assembly = 0x20,
    /// AssemblyRef
    AssemblyRef = 0x23,
}

impl TableId {
    /// Metadata token for a 1-based row
    pub fn token(self, row: u32) -> u32 {
        (u32::from(self as u8) << 24) | row
    }
}

/// Token of a string in the `#US` heap
pub fn user_string_token(offset: u32) -> u32 {
    0x7000_0000 | offset
}

/// Coded index kinds used by the emitted tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedIndex {
    /// TypeDef, TypeRef, TypeSpec
    TypeDefOrRef,
    /// Module, ModuleRef, AssemblyRef, TypeRef
    ResolutionScope,
    /// TypeDef, TypeRef, ModuleRef, MethodDef, TypeSpec
    MemberRefParent,
}

impl CodedIndex {
    fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::TypeDefOrRef | CodedIndex::ResolutionScope => 2,
            CodedIndex::MemberRefParent => 3,
        }
    }

    /// Encode `row` of `table` in this coded index
    pub fn encode(self, table: TableId, row: u32) -> u32 {
        let tag = match (self, table) {
            (CodedIndex::TypeDefOrRef, TableId::TypeDef) => 0,
            (CodedIndex::TypeDefOrRef, TableId::TypeRef) => 1,
            (CodedIndex::TypeDefOrRef, TableId::TypeSpec) => 2,
            (CodedIndex::ResolutionScope, TableId::Module) => 0,
            (CodedIndex::ResolutionScope, TableId::AssemblyRef) => 2,
            (CodedIndex::ResolutionScope, TableId::TypeRef) => 3,
            (CodedIndex::MemberRefParent, TableId::TypeDef) => 0,
            (CodedIndex::MemberRefParent, TableId::TypeRef) => 1,
            (CodedIndex::MemberRefParent, TableId::MethodDef) => 3,
            (CodedIndex::MemberRefParent, TableId::TypeSpec) => 4,
            _ => unreachable!("{:?} cannot hold {:?}", self, table),
        };
        (row << self.tag_bits()) | tag
    }

    fn members(self) -> &'static [TableId] {
        match self {
            CodedIndex::TypeDefOrRef => &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec],
            CodedIndex::ResolutionScope => &[TableId::Module, TableId::AssemblyRef, TableId::TypeRef],
            CodedIndex::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
        }
    }
}

/// `Module` row
#[derive(Debug, Clone)]
pub struct ModuleRow {
    /// `#Strings` offset
    pub name: u32,
    /// `#GUID` index
    pub mvid: u32,
}

/// `TypeRef` row
#[derive(Debug, Clone)]
pub struct TypeRefRow {
    /// ResolutionScope coded index
    pub scope: u32,
    /// `#Strings` offset
    pub name: u32,
    /// `#Strings` offset
    pub namespace: u32,
}

/// `TypeDef` row
#[derive(Debug, Clone)]
pub struct TypeDefRow {
    /// TypeAttributes
    pub flags: u32,
    /// `#Strings` offset
    pub name: u32,
    /// `#Strings` offset
    pub namespace: u32,
    /// TypeDefOrRef coded index, 0 for none
    pub extends: u32,
    /// First Field row
    pub field_list: u32,
    /// First MethodDef row
    pub method_list: u32,
}

/// `Field` row
#[derive(Debug, Clone)]
pub struct FieldRow {
    /// FieldAttributes
    pub flags: u16,
    /// `#Strings` offset
    pub name: u32,
    /// `#Blob` offset
    pub signature: u32,
}

/// `MethodDef` row
#[derive(Debug, Clone)]
pub struct MethodDefRow {
    /// Body RVA
    pub rva: u32,
    /// MethodImplAttributes
    pub impl_flags: u16,
    /// MethodAttributes
    pub flags: u16,
    /// `#Strings` offset
    pub name: u32,
    /// `#Blob` offset
    pub signature: u32,
    /// First Param row
    pub param_list: u32,
}

/// `Param` row
#[derive(Debug, Clone)]
pub struct ParamRow {
    /// ParamAttributes
    pub flags: u16,
    /// 1-based position
    pub sequence: u16,
    /// `#Strings` offset
    pub name: u32,
}

/// `MemberRef` row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRefRow {
    /// MemberRefParent coded index
    pub class: u32,
    /// `#Strings` offset
    pub name: u32,
    /// `#Blob` offset
    pub signature: u32,
}

/// `Assembly` row
#[derive(Debug, Clone)]
pub struct AssemblyRow {
    /// Major, minor, build, revision
    pub version: [u16; 4],
    /// `#Strings` offset
    pub name: u32,
}

/// `AssemblyRef` row
#[derive(Debug, Clone)]
pub struct AssemblyRefRow {
    /// Major, minor, build, revision
    pub version: [u16; 4],
    /// `#Blob` offset of the public key token
    pub public_key_or_token: u32,
    /// `#Strings` offset
    pub name: u32,
}

/// All rows of the emitted tables
#[derive(Debug, Default)]
pub struct Tables {
    /// Module
    pub module: Vec<ModuleRow>,
    /// TypeRef
    pub type_refs: Vec<TypeRefRow>,
    /// TypeDef
    pub type_defs: Vec<TypeDefRow>,
    /// Field
    pub fields: Vec<FieldRow>,
    /// MethodDef
    pub methods: Vec<MethodDefRow>,
    /// Param
    pub params: Vec<ParamRow>,
    /// MemberRef
    pub member_refs: Vec<MemberRefRow>,
    /// StandAloneSig (`#Blob` offsets)
    pub stand_alone_sigs: Vec<u32>,
    /// TypeSpec (`#Blob` offsets)
    pub type_specs: Vec<u32>,
    /// Assembly
    pub assembly: Vec<AssemblyRow>,
    /// AssemblyRef
    pub assembly_refs: Vec<AssemblyRefRow>,
}

/// Widths of heap indexes
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapSizes {
    /// `#Strings` needs 4 bytes
    pub wide_strings: bool,
    /// `#GUID` needs 4 bytes
    pub wide_guids: bool,
    /// `#Blob` needs 4 bytes
    pub wide_blobs: bool,
}

impl HeapSizes {
    fn flags(self) -> u8 {
        u8::from(self.wide_strings) | (u8::from(self.wide_guids) << 1) | (u8::from(self.wide_blobs) << 2)
    }
}

// Tables that are sorted by their key column when present
const SORTED_TABLES: u64 = 0x0000_1600_3301_FA00;

impl Tables {
    fn row_count(&self, table: TableId) -> usize {
        match table {
            TableId::Module => self.module.len(),
            TableId::TypeRef => self.type_refs.len(),
            TableId::TypeDef => self.type_defs.len(),
            TableId::Field => self.fields.len(),
            TableId::MethodDef => self.methods.len(),
            TableId::Param => self.params.len(),
            TableId::MemberRef => self.member_refs.len(),
            TableId::StandAloneSig => self.stand_alone_sigs.len(),
            TableId::TypeSpec => self.type_specs.len(),
            TableId::Assembly => self.assembly.len(),
            TableId::AssemblyRef => self.assembly_refs.len(),
        }
    }

    fn wide_table(&self, table: TableId) -> bool {
        self.row_count(table) >= 0x10000
    }

    fn wide_coded(&self, coded: CodedIndex) -> bool {
        let limit = 1usize << (16 - coded.tag_bits());
        coded.members().iter().any(|&t| self.row_count(t) >= limit)
    }

    /// Serialize the `#~` stream
    pub fn finish(&self, heaps: HeapSizes) -> Vec<u8> {
        const ORDER: [TableId; 11] = [
            TableId::Module,
            TableId::TypeRef,
            TableId::TypeDef,
            TableId::Field,
            TableId::MethodDef,
            TableId::Param,
            TableId::MemberRef,
            TableId::StandAloneSig,
            TableId::TypeSpec,
            TableId::Assembly,
            TableId::AssemblyRef,
        ];

        let mut w = ByteWriter::new();
        w.emit_u32(0);
        w.emit_u8(2);
        w.emit_u8(0);
        w.emit_u8(heaps.flags());
        w.emit_u8(1);

        let valid = ORDER
            .iter()
            .filter(|&&t| self.row_count(t) > 0)
            .fold(0u64, |mask, &t| mask | (1u64 << (t as u8)));
        w.emit_u64(valid);
        w.emit_u64(SORTED_TABLES);
        for &table in ORDER.iter().filter(|&&t| self.row_count(t) > 0) {
            w.emit_u32(self.row_count(table) as u32);
        }

        let s = heaps.wide_strings;
        let g = heaps.wide_guids;
        let b = heaps.wide_blobs;

        for row in &self.module {
            w.emit_u16(0);
            w.emit_index(row.name, s);
            w.emit_index(row.mvid, g);
            w.emit_index(0, g);
            w.emit_index(0, g);
        }
        let scope = self.wide_coded(CodedIndex::ResolutionScope);
        for row in &self.type_refs {
            w.emit_index(row.scope, scope);
            w.emit_index(row.name, s);
            w.emit_index(row.namespace, s);
        }
        let type_def_or_ref = self.wide_coded(CodedIndex::TypeDefOrRef);
        let field_index = self.wide_table(TableId::Field);
        let method_index = self.wide_table(TableId::MethodDef);
        for row in &self.type_defs {
            w.emit_u32(row.flags);
            w.emit_index(row.name, s);
            w.emit_index(row.namespace, s);
            w.emit_index(row.extends, type_def_or_ref);
            w.emit_index(row.field_list, field_index);
            w.emit_index(row.method_list, method_index);
        }
        for row in &self.fields {
            w.emit_u16(row.flags);
            w.emit_index(row.name, s);
            w.emit_index(row.signature, b);
        }
        let param_index = self.wide_table(TableId::Param);
        for row in &self.methods {
            w.emit_u32(row.rva);
            w.emit_u16(row.impl_flags);
            w.emit_u16(row.flags);
            w.emit_index(row.name, s);
            w.emit_index(row.signature, b);
            w.emit_index(row.param_list, param_index);
        }
        for row in &self.params {
            w.emit_u16(row.flags);
            w.emit_u16(row.sequence);
            w.emit_index(row.name, s);
        }
        let parent = self.wide_coded(CodedIndex::MemberRefParent);
        for row in &self.member_refs {
            w.emit_index(row.class, parent);
            w.emit_index(row.name, s);
            w.emit_index(row.signature, b);
        }
        for &signature in &self.stand_alone_sigs {
            w.emit_index(signature, b);
        }
        for &signature in &self.type_specs {
            w.emit_index(signature, b);
        }
        for row in &self.assembly {
            // SHA1
            w.emit_u32(0x8004);
            for part in row.version {
                w.emit_u16(part);
            }
            w.emit_u32(0);
            w.emit_index(0, b);
            w.emit_index(row.name, s);
            w.emit_index(0, s);
        }
        for row in &self.assembly_refs {
            for part in row.version {
                w.emit_u16(part);
            }
            w.emit_u32(0);
            w.emit_index(row.public_key_or_token, b);
            w.emit_index(row.name, s);
            w.emit_index(0, s);
            w.emit_index(0, b);
        }

        w.align(4);
        w.into_bytes()
    }
}
