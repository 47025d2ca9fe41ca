//! Node identity and metadata shared by every AST node

use fifth_types::FifthType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a syntactic node.
///
/// Parent links and symbol tables are side tables keyed by `NodeId`, so a
/// rewrite that copies a node forward keeps its id while synthesized nodes
/// receive fresh ones. `NodeId(0)` marks a node that has not been numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw id value
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether the id was assigned by a builder
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a construct in the source text
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file name
    #[serde(default)]
    pub file: Option<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Location inside a named file
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Metadata carried by every node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Node identity; assigned when the tree is built or loaded
    #[serde(skip)]
    pub id: NodeId,
    /// Where the construct came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Inferred type, populated by type annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<FifthType>,
}

impl Meta {
    /// Fresh metadata for a node with the given id
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            location: None,
            ty: None,
        }
    }

    /// Same metadata under another id
    pub fn with_id(&self, id: NodeId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }
}

/// Access to the metadata of a node, and copy-with-modified-metadata.
pub trait AstNode: Clone {
    /// The node's metadata
    fn meta(&self) -> &Meta;

    /// A copy of this node carrying different metadata
    fn with_meta(&self, meta: Meta) -> Self;

    /// The node's id
    fn id(&self) -> NodeId {
        self.meta().id
    }

    /// The node's source location
    fn location(&self) -> Option<&SourceLocation> {
        self.meta().location.as_ref()
    }

    /// The node's inferred type
    fn ty(&self) -> Option<&FifthType> {
        self.meta().ty.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(SourceLocation::new("main.5th", 3, 7).to_string(), "main.5th:3:7");
        let anonymous = SourceLocation {
            file: None,
            line: 1,
            column: 2,
        };
        assert_eq!(anonymous.to_string(), "1:2");
    }

    #[test]
    fn test_meta_with_id_keeps_location_and_type() {
        let meta = Meta {
            id: NodeId(4),
            location: Some(SourceLocation::new("a", 1, 1)),
            ty: Some(FifthType::INT),
        };
        let moved = meta.with_id(NodeId(9));
        assert_eq!(moved.id, NodeId(9));
        assert_eq!(moved.location, meta.location);
        assert_eq!(moved.ty, meta.ty);
    }
}
