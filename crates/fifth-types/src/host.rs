//! Host runtime type names

use crate::ty::Primitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified name of a type on the host runtime (`System.Int32`,
/// `VDS.RDF.IGraph`, `System.String[]`).
///
/// User-defined types appear by their plain name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostType(String);

impl HostType {
    /// Wrap a fully qualified type name
    pub fn new(name: impl Into<String>) -> Self {
        HostType(name.into())
    }

    /// `System.Void`
    pub fn void() -> Self {
        HostType::new("System.Void")
    }

    /// `System.Object`
    pub fn object() -> Self {
        HostType::new("System.Object")
    }

    /// `System.String`
    pub fn string() -> Self {
        HostType::new("System.String")
    }

    /// `System.Int32`
    pub fn int32() -> Self {
        HostType::new("System.Int32")
    }

    /// `System.Double`
    pub fn double() -> Self {
        HostType::new("System.Double")
    }

    /// `System.Boolean`
    pub fn boolean() -> Self {
        HostType::new("System.Boolean")
    }

    /// `System.Decimal`
    pub fn decimal() -> Self {
        HostType::new("System.Decimal")
    }

    /// The knowledge-graph type behind Fifth's `graph`
    pub fn graph() -> Self {
        HostType::new("VDS.RDF.IGraph")
    }

    /// The RDF triple type behind Fifth's `triple`
    pub fn triple() -> Self {
        HostType::new("VDS.RDF.Triple")
    }

    /// The full name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Namespace part (`System` for `System.Int32`); empty for plain names
    pub fn namespace(&self) -> &str {
        match self.0.rfind('.') {
            Some(dot) => &self.0[..dot],
            None => "",
        }
    }

    /// Name without namespace
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(dot) => &self.0[dot + 1..],
            None => &self.0,
        }
    }

    /// Single-dimensional array of this type
    pub fn array_of(&self) -> HostType {
        HostType(format!("{}[]", self.0))
    }

    /// Element type if this is an array
    pub fn element(&self) -> Option<HostType> {
        self.0.strip_suffix("[]").map(HostType::new)
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.0.ends_with("[]")
    }

    /// Whether this is `System.Void`
    pub fn is_void(&self) -> bool {
        self.0 == "System.Void"
    }

    /// Whether this is `System.Object`
    pub fn is_object(&self) -> bool {
        self.0 == "System.Object"
    }

    /// The Fifth primitive with this host representation
    pub fn primitive(&self) -> Option<Primitive> {
        if self.0.contains('.') {
            Primitive::from_name(&self.0)
        } else {
            None
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostType {
    fn from(name: &str) -> Self {
        HostType::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts() {
        let ty = HostType::graph();
        assert_eq!(ty.namespace(), "VDS.RDF");
        assert_eq!(ty.simple_name(), "IGraph");

        let plain = HostType::new("Person");
        assert_eq!(plain.namespace(), "");
        assert_eq!(plain.simple_name(), "Person");
    }

    #[test]
    fn test_arrays() {
        let arr = HostType::int32().array_of();
        assert!(arr.is_array());
        assert_eq!(arr.element(), Some(HostType::int32()));
        assert_eq!(HostType::int32().element(), None);
    }

    #[test]
    fn test_plain_names_are_not_primitives() {
        // A user class called `String` must not collapse into System.String.
        assert_eq!(HostType::new("String").primitive(), None);
        assert_eq!(HostType::string().primitive(), Some(Primitive::String));
    }
}
