//! Core type definitions for the Fifth type system

use crate::host::HostType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in scalar types of the Fifth language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Primitive {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `int` (32-bit signed)
    Int,
    /// `long` (64-bit signed)
    Long,
    /// `float` (single precision)
    Float,
    /// `double` (double precision)
    Double,
    /// `decimal` (128-bit decimal)
    Decimal,
    /// `string`
    String,
}

impl Primitive {
    /// Look up a primitive by its Fifth keyword or host runtime name.
    pub fn from_name(name: &str) -> Option<Primitive> {
        let prim = match name {
            "bool" | "Boolean" | "System.Boolean" => Primitive::Bool,
            "char" | "Char" | "System.Char" => Primitive::Char,
            "byte" | "Byte" | "System.Byte" => Primitive::Byte,
            "short" | "Int16" | "System.Int16" => Primitive::Short,
            "int" | "Int32" | "System.Int32" => Primitive::Int,
            "long" | "Int64" | "System.Int64" => Primitive::Long,
            "float" | "Single" | "System.Single" => Primitive::Float,
            "double" | "Double" | "System.Double" => Primitive::Double,
            "decimal" | "Decimal" | "System.Decimal" => Primitive::Decimal,
            "string" | "String" | "System.String" => Primitive::String,
            _ => return None,
        };
        Some(prim)
    }

    /// The Fifth source keyword for this primitive
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Decimal => "decimal",
            Primitive::String => "string",
        }
    }

    /// The fully qualified host runtime name
    pub fn host_name(self) -> &'static str {
        match self {
            Primitive::Bool => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::Byte => "System.Byte",
            Primitive::Short => "System.Int16",
            Primitive::Int => "System.Int32",
            Primitive::Long => "System.Int64",
            Primitive::Float => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::Decimal => "System.Decimal",
            Primitive::String => "System.String",
        }
    }

    /// Whether arithmetic operators apply to this primitive
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Long | Primitive::Float | Primitive::Double | Primitive::Decimal
        )
    }

    /// Whether a value of this primitive converts implicitly to `dest`.
    ///
    /// Only the widening conversions the host performs silently qualify:
    /// int to {long, float, double, decimal}, float to double, and
    /// long to {float, double, decimal}.
    pub fn widens_to(self, dest: Primitive) -> bool {
        match self {
            Primitive::Int => matches!(
                dest,
                Primitive::Long | Primitive::Float | Primitive::Double | Primitive::Decimal
            ),
            Primitive::Float => dest == Primitive::Double,
            Primitive::Long => matches!(
                dest,
                Primitive::Float | Primitive::Double | Primitive::Decimal
            ),
            _ => false,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A Fifth type
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FifthType {
    /// No local determination was possible
    #[default]
    Unknown,
    /// The `void` type
    Void,
    /// A built-in scalar
    Primitive(Primitive),
    /// A user-defined type, referenced by name
    Named(String),
    /// A type reflected from the host runtime
    Host(HostType),
    /// Fixed-size array: `T[]`
    Array(Box<FifthType>),
    /// List: `[T]`
    List(Box<FifthType>),
    /// Function type
    Function {
        /// Parameter types
        params: Vec<FifthType>,
        /// Return type
        returns: Box<FifthType>,
    },
}

impl FifthType {
    /// Shorthand for `int`
    pub const INT: FifthType = FifthType::Primitive(Primitive::Int);
    /// Shorthand for `bool`
    pub const BOOL: FifthType = FifthType::Primitive(Primitive::Bool);
    /// Shorthand for `string`
    pub const STRING: FifthType = FifthType::Primitive(Primitive::String);
    /// Shorthand for `double`
    pub const DOUBLE: FifthType = FifthType::Primitive(Primitive::Double);

    /// Parse a type name as written in source (`int`, `Person`, `int[]`, `[string]`,
    /// `graph`, `System.Text.StringBuilder`).
    pub fn parse(name: &str) -> FifthType {
        let name = name.trim();
        if name.is_empty() {
            return FifthType::Unknown;
        }
        if let Some(inner) = name.strip_suffix("[]") {
            return FifthType::Array(Box::new(FifthType::parse(inner)));
        }
        if let Some(inner) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
            return FifthType::List(Box::new(FifthType::parse(inner)));
        }
        if let Some(prim) = Primitive::from_name(name) {
            return FifthType::Primitive(prim);
        }
        match name {
            "void" | "System.Void" => FifthType::Void,
            "object" | "System.Object" => FifthType::Host(HostType::object()),
            "graph" => FifthType::Host(HostType::graph()),
            "triple" => FifthType::Host(HostType::triple()),
            _ if name.contains('.') => FifthType::Host(HostType::new(name)),
            _ => FifthType::Named(name.to_string()),
        }
    }

    /// Map a host runtime type back into the Fifth type system.
    pub fn from_host(host: &HostType) -> FifthType {
        if host.is_void() {
            return FifthType::Void;
        }
        if let Some(prim) = host.primitive() {
            return FifthType::Primitive(prim);
        }
        if let Some(element) = host.element() {
            return FifthType::Array(Box::new(FifthType::from_host(&element)));
        }
        FifthType::Host(host.clone())
    }

    /// The host runtime type this type lowers to, if it has one.
    ///
    /// Lists lower to arrays. User-defined types keep their plain name.
    pub fn to_host(&self) -> Option<HostType> {
        match self {
            FifthType::Unknown | FifthType::Function { .. } => None,
            FifthType::Void => Some(HostType::void()),
            FifthType::Primitive(prim) => Some(HostType::new(prim.host_name())),
            FifthType::Named(name) => Some(HostType::new(name.clone())),
            FifthType::Host(host) => Some(host.clone()),
            FifthType::Array(element) | FifthType::List(element) => {
                element.to_host().map(|e| e.array_of())
            }
        }
    }

    /// The primitive behind this type, if any
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            FifthType::Primitive(prim) => Some(*prim),
            FifthType::Host(host) => host.primitive(),
            _ => None,
        }
    }

    /// Element type of an array or list
    pub fn element(&self) -> Option<&FifthType> {
        match self {
            FifthType::Array(element) | FifthType::List(element) => Some(element),
            _ => None,
        }
    }

    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, FifthType::Void)
    }

    /// Whether this carries no information
    pub fn is_unknown(&self) -> bool {
        matches!(self, FifthType::Unknown)
    }

    /// Whether this is `string`
    pub fn is_string(&self) -> bool {
        self.primitive() == Some(Primitive::String)
    }

    /// Whether this is `bool`
    pub fn is_bool(&self) -> bool {
        self.primitive() == Some(Primitive::Bool)
    }

    /// Whether arithmetic applies
    pub fn is_numeric(&self) -> bool {
        self.primitive().is_some_and(Primitive::is_numeric)
    }

    /// Whether this is the knowledge-graph type
    pub fn is_graph(&self) -> bool {
        matches!(self, FifthType::Host(h) if *h == HostType::graph())
    }

    /// Whether this is the RDF triple type
    pub fn is_triple(&self) -> bool {
        matches!(self, FifthType::Host(h) if *h == HostType::triple())
    }

    /// Whether this is a reference type on the host (null is its default value)
    pub fn is_reference(&self) -> bool {
        match self {
            FifthType::Primitive(prim) => *prim == Primitive::String,
            FifthType::Unknown | FifthType::Void => false,
            _ => true,
        }
    }

    /// Promote two numeric operand types to their common arithmetic type.
    ///
    /// The order is fixed: double > float > long > decimal > int.
    pub fn promote_numeric(a: &FifthType, b: &FifthType) -> Option<FifthType> {
        let (a, b) = (a.primitive()?, b.primitive()?);
        if !a.is_numeric() || !b.is_numeric() {
            return None;
        }
        let promoted = [
            Primitive::Double,
            Primitive::Float,
            Primitive::Long,
            Primitive::Decimal,
        ]
        .into_iter()
        .find(|p| a == *p || b == *p)
        .unwrap_or(Primitive::Int);
        Some(FifthType::Primitive(promoted))
    }

    /// Whether a value of `self` can be stored where `target` is expected
    /// without an explicit conversion.
    pub fn is_compatible_with(&self, target: &FifthType) -> bool {
        if self == target || self.is_unknown() || target.is_unknown() {
            return true;
        }
        match (self.primitive(), target.primitive()) {
            (Some(src), Some(dst)) => src == dst || src.widens_to(dst),
            _ => self.to_host() == target.to_host(),
        }
    }
}

impl fmt::Display for FifthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FifthType::Unknown => write!(f, "unknown"),
            FifthType::Void => write!(f, "void"),
            FifthType::Primitive(prim) => write!(f, "{}", prim),
            FifthType::Named(name) => write!(f, "{}", name),
            FifthType::Host(host) if *host == HostType::graph() => write!(f, "graph"),
            FifthType::Host(host) if *host == HostType::triple() => write!(f, "triple"),
            FifthType::Host(host) => write!(f, "{}", host),
            FifthType::Array(element) => write!(f, "{}[]", element),
            FifthType::List(element) => write!(f, "[{}]", element),
            FifthType::Function { params, returns } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", returns)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_type_names() {
        assert_eq!(FifthType::parse("int"), FifthType::INT);
        assert_eq!(FifthType::parse("System.Int32"), FifthType::INT);
        assert_eq!(FifthType::parse("void"), FifthType::Void);
        assert_eq!(
            FifthType::parse("int[]"),
            FifthType::Array(Box::new(FifthType::INT))
        );
        assert_eq!(
            FifthType::parse("[string]"),
            FifthType::List(Box::new(FifthType::STRING))
        );
        assert_eq!(FifthType::parse("Person"), FifthType::Named("Person".into()));
        assert!(FifthType::parse("graph").is_graph());
        assert_eq!(
            FifthType::parse("System.Text.StringBuilder"),
            FifthType::Host(HostType::new("System.Text.StringBuilder"))
        );
    }

    #[test]
    fn test_numeric_promotion_order() {
        let int = FifthType::INT;
        let long = FifthType::Primitive(Primitive::Long);
        let float = FifthType::Primitive(Primitive::Float);
        let decimal = FifthType::Primitive(Primitive::Decimal);

        assert_eq!(FifthType::promote_numeric(&int, &int), Some(int.clone()));
        assert_eq!(FifthType::promote_numeric(&int, &long), Some(long.clone()));
        assert_eq!(FifthType::promote_numeric(&long, &decimal), Some(long.clone()));
        assert_eq!(FifthType::promote_numeric(&decimal, &float), Some(float));
        assert_eq!(
            FifthType::promote_numeric(&int, &FifthType::DOUBLE),
            Some(FifthType::DOUBLE)
        );
        assert_eq!(FifthType::promote_numeric(&int, &FifthType::STRING), None);
    }

    #[test]
    fn test_widening() {
        assert!(Primitive::Int.widens_to(Primitive::Long));
        assert!(Primitive::Int.widens_to(Primitive::Decimal));
        assert!(Primitive::Float.widens_to(Primitive::Double));
        assert!(!Primitive::Double.widens_to(Primitive::Float));
        assert!(!Primitive::Long.widens_to(Primitive::Int));
        assert!(!Primitive::Float.widens_to(Primitive::Decimal));
    }

    #[test]
    fn test_host_round_trip_for_arrays() {
        let ty = FifthType::parse("double[]");
        let host = ty.to_host().unwrap();
        assert_eq!(host.name(), "System.Double[]");
        assert_eq!(FifthType::from_host(&host), ty);
    }
}
