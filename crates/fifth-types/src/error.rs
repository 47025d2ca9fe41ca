//! Signature database errors

use thiserror::Error;

/// Errors raised while loading a signature database
#[derive(Debug, Error)]
pub enum SignatureDbError {
    /// The table is not valid JSON or does not match the schema
    #[error("Malformed signature table: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Two entries describe the same type
    #[error("Duplicate type '{name}' in signature table")]
    DuplicateType {
        /// Type name
        name: String,
    },

    /// A builtin or extension host names a type the table does not define
    #[error("Host type '{name}' is not defined in the signature table")]
    UnknownHost {
        /// Type name
        name: String,
    },
}

/// Result alias for signature database operations
pub type SignatureDbResult<T> = Result<T, SignatureDbError>;
