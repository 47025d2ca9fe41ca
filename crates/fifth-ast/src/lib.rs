//! Fifth AST
//!
//! The abstract syntax tree handed over by the parser and rewritten by the
//! lowering pipeline. Nodes are immutable and shared through [`Rc`]; a
//! rewrite builds new nodes along the changed path and reuses every
//! untouched subtree.
//!
//! [`Rc`]: std::rc::Rc

#![warn(missing_docs)]

pub mod ast;
pub mod builder;
pub mod error;
pub mod json;
pub mod node;
pub mod ops;
pub mod rewrite;
pub mod visit;

pub use ast::*;
pub use builder::AstBuilder;
pub use error::{AstError, AstResult};
pub use node::{AstNode, Meta, NodeId, SourceLocation};
pub use ops::{BinaryOp, UnaryOp};
pub use rewrite::{Rewriter, Rewritten};
pub use visit::Visitor;
