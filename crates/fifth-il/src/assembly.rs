//! Assembly-level intermediate representation

use crate::instruction::InstructionSequence;
use crate::types::{IlType, TypeRef, SYSTEM_RUNTIME};
use serde::{Deserialize, Serialize};

/// Public key token of the base runtime assemblies
pub const RUNTIME_PUBLIC_KEY_TOKEN: [u8; 8] = [0xb0, 0x3f, 0x5f, 0x7f, 0x11, 0xd5, 0x0a, 0x3a];

/// Referenced external assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRefIr {
    /// Simple name
    pub name: String,
    /// Major, minor, build, revision
    pub version: [u16; 4],
    /// Public key token, if strong-named
    pub public_key_token: Option<[u8; 8]>,
}

impl AssemblyRefIr {
    /// A base runtime assembly (`System.Runtime`, `System.Console`)
    pub fn runtime(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: [8, 0, 0, 0],
            public_key_token: Some(RUNTIME_PUBLIC_KEY_TOKEN),
        }
    }

    /// A library referenced without a strong name
    pub fn library(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: [1, 0, 0, 0],
            public_key_token: None,
        }
    }
}

/// A field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIr {
    /// Name
    pub name: String,
    /// Type
    pub ty: IlType,
    /// Static field
    pub is_static: bool,
}

/// A parameter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamIr {
    /// Name
    pub name: String,
    /// Type
    pub ty: IlType,
}

/// A local variable slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalIr {
    /// Name used by `Load::Local`/`Store::Local`
    pub name: String,
    /// Type
    pub ty: IlType,
}

/// Method flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Static method
    Static,
    /// Instance method; argument 0 is `this`
    Instance,
    /// Instance constructor
    Constructor,
}

/// A method definition with its body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodIr {
    /// Name
    pub name: String,
    /// Flavour
    pub kind: MethodKind,
    /// Declared parameters, `this` excluded
    pub params: Vec<ParamIr>,
    /// Return type
    pub return_type: IlType,
    /// Local variables, in slot order
    pub locals: Vec<LocalIr>,
    /// Body
    pub body: InstructionSequence,
    /// Process entry point
    pub is_entry_point: bool,
}

impl MethodIr {
    /// Whether argument 0 is `this`
    pub fn has_this(&self) -> bool {
        self.kind != MethodKind::Static
    }

    /// Argument index of a named parameter, counting `this`
    pub fn arg_index(&self, name: &str) -> Option<usize> {
        let offset = usize::from(self.has_this());
        if name == "this" && self.has_this() {
            return Some(0);
        }
        self.params.iter().position(|p| p.name == name).map(|i| i + offset)
    }

    /// Slot of a named local
    pub fn local_index(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|l| l.name == name)
    }
}

/// A type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIr {
    /// Namespace, possibly empty
    pub namespace: String,
    /// Name
    pub name: String,
    /// Base type
    pub base: TypeRef,
    /// Abstract and sealed: holds only static members
    pub is_static: bool,
    /// Fields
    pub fields: Vec<FieldIr>,
    /// Methods
    pub methods: Vec<MethodIr>,
}

impl TypeIr {
    /// Reference to this type from inside the assembly
    pub fn type_ref(&self) -> TypeRef {
        TypeRef {
            assembly: None,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// One output assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyIr {
    /// Assembly name
    pub name: String,
    /// Version
    pub version: [u16; 4],
    /// Referenced assemblies
    pub references: Vec<AssemblyRefIr>,
    /// Defined types
    pub types: Vec<TypeIr>,
}

impl AssemblyIr {
    /// Empty assembly referencing the base runtime
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: [1, 0, 0, 0],
            references: vec![AssemblyRefIr::runtime(SYSTEM_RUNTIME)],
            types: Vec::new(),
        }
    }

    /// Add a reference unless one with the same name exists
    pub fn add_reference(&mut self, reference: AssemblyRefIr) {
        if !self.references.iter().any(|r| r.name == reference.name) {
            self.references.push(reference);
        }
    }

    /// The entry method and its declaring type
    pub fn entry_point(&self) -> Option<(&TypeIr, &MethodIr)> {
        self.types.iter().find_map(|ty| {
            ty.methods
                .iter()
                .find(|m| m.is_entry_point)
                .map(|m| (ty, m))
        })
    }

    /// Total number of methods
    pub fn method_count(&self) -> usize {
        self.types.iter().map(|t| t.methods.len()).sum()
    }
}
