//! Compiler driver errors

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for the compiler driver
pub type CompileResult<T> = Result<T, CompileError>;

/// Result alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures of the driver itself; semantic problems are diagnostics instead
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .json syntax tree found in {0}")]
    NoSources(PathBuf),

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: fifth_ast::AstError,
    },

    #[error("Signature database unavailable: {0}")]
    Signatures(#[from] fifth_types::SignatureDbError),

    #[error("Executable emission failed for {0}")]
    Emission(PathBuf),

    #[error("IL assembler not found; set FIFTH_ILASM_PATH to the ilasm executable")]
    AssemblerNotFound,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Project file problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid project file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
