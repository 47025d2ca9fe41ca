//! Host method/field signatures and the lookup capability over them

use crate::host::HostType;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared default value of an optional parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// Boolean default
    Bool(bool),
    /// Integral default
    Int(i64),
    /// Floating-point default
    Float(f64),
    /// String default
    String(String),
    /// Null reference
    Null,
}

/// One declared parameter of a host method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSignature {
    /// Parameter name
    pub name: String,
    /// Parameter type
    #[serde(rename = "type")]
    pub ty: HostType,
    /// Declared default value, if any
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Whether the parameter may be omitted by callers
    #[serde(default)]
    pub optional: bool,
}

impl ParamSignature {
    /// Create a required parameter
    pub fn new(name: impl Into<String>, ty: impl Into<HostType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default: None,
            optional: false,
        }
    }

    /// Mark the parameter optional with a declared default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self.optional = true;
        self
    }

    /// Whether callers may leave this parameter out
    pub fn is_omittable(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

fn static_by_default() -> bool {
    true
}

/// A public method on a host type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Type that declares the method; filled in when the table is indexed
    #[serde(skip)]
    pub declaring_type: HostType,
    /// Method name
    pub name: String,
    /// Declared parameters
    #[serde(default)]
    pub params: Vec<ParamSignature>,
    /// Return type
    #[serde(rename = "returns")]
    pub return_type: HostType,
    /// Static methods take no implicit receiver
    #[serde(default = "static_by_default")]
    pub is_static: bool,
    /// Generic method definition
    #[serde(default)]
    pub generic: bool,
    /// Declared as an extension method (first parameter is the receiver)
    #[serde(default)]
    pub extension: bool,
}

impl MethodSignature {
    /// Create a static, non-generic method signature
    pub fn new(
        declaring_type: impl Into<HostType>,
        name: impl Into<String>,
        params: Vec<ParamSignature>,
        return_type: impl Into<HostType>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            params,
            return_type: return_type.into(),
            is_static: true,
            generic: false,
            extension: false,
        }
    }

    /// Mark as a generic method definition
    pub fn as_generic(mut self) -> Self {
        self.generic = true;
        self
    }

    /// Mark as an extension method
    pub fn as_extension(mut self) -> Self {
        self.extension = true;
        self
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether the method returns nothing
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Parameter types in declaration order
    pub fn param_types(&self) -> impl Iterator<Item = &HostType> {
        self.params.iter().map(|p| &p.ty)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.declaring_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", param.ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// A public field or property on a host type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSignature {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub ty: HostType,
    /// Static fields are read without a receiver
    #[serde(default)]
    pub is_static: bool,
}

/// Reflected shape of a host type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Fully qualified name
    pub name: HostType,
    /// Defining assembly
    pub assembly: String,
    /// Value types are passed by value and have no null
    #[serde(default)]
    pub value_type: bool,
    /// Interface types
    #[serde(default)]
    pub interface: bool,
    /// Base type
    #[serde(default)]
    pub base: Option<HostType>,
    /// Implemented interfaces
    #[serde(default)]
    pub interfaces: Vec<HostType>,
    /// Public fields and properties
    #[serde(default)]
    pub fields: Vec<FieldSignature>,
    /// Public methods
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
}

/// Signature lookup against host runtime types.
///
/// The method resolver and type inference only ever see the host through
/// this trait, so the signatures can come from a precomputed table or from a
/// live runtime.
pub trait HostTypeProvider {
    /// Reflected shape of a type
    fn type_info(&self, ty: &HostType) -> Option<&TypeInfo>;

    /// Find a type by full name, or by simple name when unambiguous
    fn find_type(&self, name: &str) -> Option<&TypeInfo>;

    /// Public static methods named `name` on `ty`
    fn lookup(&self, ty: &HostType, name: &str) -> Vec<&MethodSignature>;

    /// Types whose static methods are callable unqualified
    fn builtin_hosts(&self) -> &[HostType];

    /// Types providing extension methods for receiver-style calls
    fn extension_hosts(&self) -> &[HostType];

    /// Whether a value of type `from` can be passed where `to` is declared,
    /// by identity, reference widening or interface implementation.
    fn is_assignable(&self, from: &HostType, to: &HostType) -> bool {
        if from == to {
            return true;
        }
        if from.is_void() || to.is_void() {
            return false;
        }
        if to.is_object() {
            return true;
        }
        if from.is_array() && to.name() == "System.Array" {
            return true;
        }

        // Arrays inherit the surface of System.Array
        let start = if from.is_array() {
            HostType::new("System.Array")
        } else {
            from.clone()
        };
        let mut pending = vec![start];
        let mut seen = FxHashSet::default();
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(info) = self.type_info(&current) else {
                continue;
            };
            for next in info.base.iter().chain(info.interfaces.iter()) {
                if next == to {
                    return true;
                }
                pending.push(next.clone());
            }
        }
        false
    }

    /// Type of a public field or property
    fn field(&self, ty: &HostType, name: &str) -> Option<&FieldSignature> {
        self.type_info(ty)?.fields.iter().find(|f| f.name == name)
    }

    /// Whether `ty` is a value type on the host
    fn is_value_type(&self, ty: &HostType) -> bool {
        self.type_info(ty).is_some_and(|info| info.value_type)
    }

    /// Assembly that defines `ty`
    fn assembly_of(&self, ty: &HostType) -> Option<&str> {
        self.type_info(ty).map(|info| info.assembly.as_str())
    }
}
