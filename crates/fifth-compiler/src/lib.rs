//! Fifth Compiler
//!
//! Code generation and orchestration for the Fifth language:
//! - [`emit`]: lowered function bodies to instruction sequences
//! - [`assembly`]: the lowered program to an [`fifth_il::AssemblyIr`]
//! - [`driver`]: the `build`, `run`, `lint` and `help` commands
//!
//! # Example
//!
//! ```no_run
//! use fifth_compiler::{Command, Compiler, CompilerOptions};
//!
//! # async fn example() {
//! let mut options = CompilerOptions::new(Command::Build);
//! options.source = Some("hello.json".into());
//! options.output = Some("hello.exe".into());
//! let result = Compiler::from_env().compile(&options).await;
//! std::process::exit(result.exit_code);
//! # }
//! ```

pub mod assembly;
pub mod context;
pub mod driver;
pub mod emit;
pub mod error;
pub mod types;

pub use assembly::build_assembly;
pub use context::EmitContext;
pub use driver::options::{Backend, Command, CompilerOptions, ProjectConfig};
pub use driver::process::{ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use driver::{exit_code, CompilationResult, Compiler};
pub use emit::{EmittedBody, Emitter};
pub use error::{CompileError, CompileResult, ConfigError, ConfigResult};
pub use types::TypeMapper;
