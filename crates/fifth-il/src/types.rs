//! Type and member references used by instructions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Assembly providing the base runtime types
pub const SYSTEM_RUNTIME: &str = "System.Runtime";

/// Reference to a type, either defined in the output assembly or imported
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    /// Defining assembly; `None` for types of the assembly being built
    pub assembly: Option<String>,
    /// Namespace, possibly empty
    pub namespace: String,
    /// Simple name
    pub name: String,
}

impl TypeRef {
    /// Imported type
    pub fn external(assembly: impl Into<String>, full_name: &str) -> Self {
        let (namespace, name) = split_name(full_name);
        Self {
            assembly: Some(assembly.into()),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Type defined by the assembly being built
    pub fn local(full_name: &str) -> Self {
        let (namespace, name) = split_name(full_name);
        Self {
            assembly: None,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Base runtime type such as `System.Object`
    pub fn system(full_name: &str) -> Self {
        Self::external(SYSTEM_RUNTIME, full_name)
    }

    /// `Namespace.Name`
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

fn split_name(full_name: &str) -> (&str, &str) {
    match full_name.rfind('.') {
        Some(dot) => (&full_name[..dot], &full_name[dot + 1..]),
        None => ("", full_name),
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(assembly) = &self.assembly {
            write!(f, "[{}]", assembly)?;
        }
        write!(f, "{}", self.full_name())
    }
}

/// Type as it appears in signatures and typed instructions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IlType {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `int8`
    I1,
    /// `uint8`
    U1,
    /// `int16`
    I2,
    /// `int32`
    I4,
    /// `int64`
    I8,
    /// `float32`
    R4,
    /// `float64`
    R8,
    /// `string`
    String,
    /// `object`
    Object,
    /// Reference type
    Class(TypeRef),
    /// Value type
    ValueType(TypeRef),
    /// Single-dimensional, zero-based array
    SzArray(Box<IlType>),
}

impl IlType {
    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, IlType::Void)
    }

    /// Array of this type
    pub fn array_of(self) -> IlType {
        IlType::SzArray(Box::new(self))
    }

    /// The named type behind a class or value type
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            IlType::Class(ty) | IlType::ValueType(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for IlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IlType::Void => f.write_str("void"),
            IlType::Bool => f.write_str("bool"),
            IlType::Char => f.write_str("char"),
            IlType::I1 => f.write_str("int8"),
            IlType::U1 => f.write_str("uint8"),
            IlType::I2 => f.write_str("int16"),
            IlType::I4 => f.write_str("int32"),
            IlType::I8 => f.write_str("int64"),
            IlType::R4 => f.write_str("float32"),
            IlType::R8 => f.write_str("float64"),
            IlType::String => f.write_str("string"),
            IlType::Object => f.write_str("object"),
            IlType::Class(ty) => write!(f, "class {}", ty),
            IlType::ValueType(ty) => write!(f, "valuetype {}", ty),
            IlType::SzArray(element) => write!(f, "{}[]", element),
        }
    }
}

/// Reference to a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Declaring type
    pub owner: TypeRef,
    /// Method name (`.ctor` for constructors)
    pub name: String,
    /// Parameter types, receiver excluded
    pub params: Vec<IlType>,
    /// Return type
    pub return_type: IlType,
    /// Instance method with an implicit `this`
    pub has_this: bool,
}

impl MethodRef {
    /// Static method
    pub fn static_method(
        owner: TypeRef,
        name: impl Into<String>,
        params: Vec<IlType>,
        return_type: IlType,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            params,
            return_type,
            has_this: false,
        }
    }

    /// Instance method
    pub fn instance_method(
        owner: TypeRef,
        name: impl Into<String>,
        params: Vec<IlType>,
        return_type: IlType,
    ) -> Self {
        Self {
            has_this: true,
            ..Self::static_method(owner, name, params, return_type)
        }
    }

    /// Parameterless instance constructor
    pub fn default_ctor(owner: TypeRef) -> Self {
        Self::instance_method(owner, ".ctor", Vec::new(), IlType::Void)
    }

    /// Whether the call produces a value
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_this {
            f.write_str("instance ")?;
        }
        write!(f, "{} {}::{}(", self.return_type, self.owner, quote_ident(&self.name))?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

/// Reference to a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Declaring type
    pub owner: TypeRef,
    /// Field name
    pub name: String,
    /// Field type
    pub ty: IlType,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.ty, self.owner, quote_ident(&self.name))
    }
}

/// Identifier as written in textual IL; names that are not plain
/// identifiers are single-quoted
pub fn quote_ident(name: &str) -> String {
    let plain = name.starts_with('.')
        || name
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && (c.is_ascii_digit() || c == '.')));
    if plain && !name.is_empty() {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "\\'"))
    }
}
