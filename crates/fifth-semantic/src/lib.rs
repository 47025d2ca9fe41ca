//! Fifth Semantic Analysis
//!
//! Everything between the parsed tree and code generation:
//! - [`diagnostic`]: diagnostics with severities, codes and locations
//! - [`linkage`] and [`symbols`]: parent links and scoped symbol tables
//! - [`infer`] and [`resolve`]: expression typing and host overload resolution
//! - [`pipeline`]: the ordered lowering phases, stopping at the first error

#![warn(missing_docs)]

pub mod diagnostic;
pub mod infer;
pub mod linkage;
pub mod phases;
pub mod pipeline;
pub mod program;
pub mod resolve;
pub mod symbols;

pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use infer::{Qualifier, TypeEnvironment, TypeInference};
pub use linkage::ParentMap;
pub use pipeline::{apply_phases, AnalysisPhase, UnknownPhase};
pub use program::{ClassInfo, FunctionSig, ProgramIndex};
pub use resolve::{CallShape, MethodResolver, Resolution};
pub use symbols::{Scope, ScopeId, ScopeKind, Symbol, SymbolKind, SymbolTable};
