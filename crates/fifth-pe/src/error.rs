//! PE emission errors

use fifth_il::VerifyError;
use thiserror::Error;

/// Errors raised while building an executable image
#[derive(Debug, Error)]
pub enum PeError {
    /// A method body failed verification
    #[error("Invalid body for {method}: {source}")]
    Verify {
        /// Method name
        method: String,
        /// Cause
        #[source]
        source: VerifyError,
    },

    /// No method is marked as the entry point
    #[error("Assembly has no entry point")]
    NoEntryPoint,

    /// A local that the method does not declare
    #[error("Unknown local '{name}' in {method}")]
    UnknownLocal {
        /// Method name
        method: String,
        /// Local name
        name: String,
    },

    /// An argument that the method does not declare
    #[error("Unknown argument '{name}' in {method}")]
    UnknownArg {
        /// Method name
        method: String,
        /// Argument name
        name: String,
    },

    /// A branch to a label the body never defines
    #[error("Unresolved label '{label}' in {method}")]
    UnresolvedLabel {
        /// Method name
        method: String,
        /// Label name
        label: String,
    },

    /// A reference to a member of this assembly that does not exist
    #[error("Unknown member {0}")]
    UnknownMember(String),

    /// A type reference into an assembly that is not referenced
    #[error("Type {ty} refers to unreferenced assembly {assembly}")]
    UnknownAssembly {
        /// Referring type
        ty: String,
        /// Missing assembly
        assembly: String,
    },

    /// Writing the image failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for PE emission
pub type PeResult<T> = Result<T, PeError>;
