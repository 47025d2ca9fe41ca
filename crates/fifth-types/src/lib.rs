//! Fifth Type System
//!
//! Type representation for the Fifth language and the host runtime it
//! compiles against:
//! - [`FifthType`]: the closed set of language-level types
//! - [`HostType`]: fully qualified host runtime type names
//! - [`HostTypeProvider`]: signature lookup against host types
//! - [`SignatureDb`]: a precomputed signature table shipped with the compiler

#![warn(missing_docs)]

pub mod database;
pub mod error;
pub mod host;
pub mod signature;
pub mod ty;

pub use database::SignatureDb;
pub use error::{SignatureDbError, SignatureDbResult};
pub use host::HostType;
pub use signature::{
    DefaultValue, FieldSignature, HostTypeProvider, MethodSignature, ParamSignature, TypeInfo,
};
pub use ty::{FifthType, Primitive};
