//! AST loading errors

use thiserror::Error;

/// Errors raised while reading or writing a serialized AST
#[derive(Debug, Error)]
pub enum AstError {
    /// The document is not a valid serialized AST
    #[error("Invalid AST document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for AST I/O
pub type AstResult<T> = Result<T, AstError>;
