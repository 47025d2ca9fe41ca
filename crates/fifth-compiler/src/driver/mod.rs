//! Compiler orchestration
//!
//! One [`Compiler::compile`] call runs a whole command: parse the serialized
//! tree, lower it, generate code, write the executable and optionally run
//! it. The outcome is a [`CompilationResult`] whose exit code is the only
//! machine-readable success signal:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | invalid options or internal failure |
//! | 2 | the syntax tree could not be read |
//! | 3 | lowering or code generation failed |
//! | 4 | the executable could not be written or assembled |
//! | 5 | the compiled program failed |

pub mod ilasm;
pub mod options;
pub mod parse;
pub mod process;

use crate::assembly::build_assembly;
use crate::error::CompileError;
use fifth_ast::AssemblyDef;
use fifth_il::{verify_method, AssemblyIr};
use fifth_semantic::{apply_phases, AnalysisPhase, Diagnostic, Diagnostics};
use fifth_types::SignatureDb;
use ilasm::{assemble, require_assembler, AssemblerLocator};
use options::{Backend, Command, CompilerOptions};
use process::{ProcessRunner, TokioProcessRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub use ilasm::ILASM_PATH_VAR;

/// Environment variable naming the host that runs compiled programs
pub const DOTNET_VAR: &str = "FIFTH_DOTNET";

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const PARSE: i32 = 2;
    pub const TRANSFORM: i32 = 3;
    pub const ASSEMBLY: i32 = 4;
    pub const RUN: i32 = 5;
}

pub const USAGE: &str = "\
Fifth Language Compiler (fifthc)

Usage: fifthc [command] [options]

Commands:
  build (default)  Lower and compile a syntax tree to an executable
  run              Same as build, then execute the produced binary
  lint             Lower only and report problems
  help             Show this help message

Options:
  --source <path>           Syntax tree file or directory (required for build/run/lint)
  --additional <path>       Further syntax trees merged into the program
  --output <path>           Output executable path (required for build/run)
  --args <args>...          Arguments passed to the program by run
  --backend <direct|ilasm>  How the executable is produced
  --up-to <phase>           Last lowering phase run by lint
  --keep-temp               Keep temporary files
  --diagnostics             Report phase progress and timings
  --verbose                 Debug logging (see FIFTH_LOG)

Examples:
  fifthc build --source hello.json --output hello.exe
  fifthc run --source hello.json --output hello.exe --args arg1 arg2
  fifthc lint --source trees/ --up-to TypeAnnotation
";

/// Outcome of one command
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    pub exit_code: i32,
    pub diagnostics: Diagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub elapsed: Duration,
    /// Captured output of the program started by `run`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CompilationResult {
    fn succeeded(diagnostics: Diagnostics, output_path: Option<PathBuf>) -> Self {
        Self {
            success: true,
            exit_code: exit_code::SUCCESS,
            diagnostics,
            output_path,
            ..Self::default()
        }
    }

    fn failed(exit_code: i32, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            exit_code,
            diagnostics,
            ..Self::default()
        }
    }
}

/// Failure of one stage: the exit code it maps to
type Stage<T> = Result<T, i32>;

/// Drives the commands; processes are started through `R`
pub struct Compiler<R = TokioProcessRunner> {
    runner: R,
    locator: AssemblerLocator,
    dotnet: PathBuf,
}

impl Compiler<TokioProcessRunner> {
    /// Compiler configured from the environment
    pub fn from_env() -> Self {
        Self::new(TokioProcessRunner)
    }
}

impl<R: ProcessRunner> Compiler<R> {
    pub fn new(runner: R) -> Self {
        let dotnet = std::env::var_os(DOTNET_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("dotnet"));
        Self {
            runner,
            locator: AssemblerLocator::from_env(),
            dotnet,
        }
    }

    pub fn with_locator(mut self, locator: AssemblerLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Host executable used by `run`
    pub fn with_host(mut self, dotnet: impl Into<PathBuf>) -> Self {
        self.dotnet = dotnet.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn compile(&self, options: &CompilerOptions) -> CompilationResult {
        let start = Instant::now();
        let mut diagnostics = Diagnostics::new();

        let problems = options.validate();
        let mut result = if problems.is_empty() {
            match options.command {
                Command::Help => {
                    print!("{}", USAGE);
                    CompilationResult::succeeded(diagnostics, None)
                }
                Command::Build => self.build_command(options, diagnostics).await,
                Command::Run => self.run_command(options, diagnostics).await,
                Command::Lint => lint_command(options, diagnostics),
            }
        } else {
            for problem in problems {
                diagnostics.push(Diagnostic::error(problem));
            }
            CompilationResult::failed(exit_code::FAILURE, diagnostics)
        };

        result.elapsed = start.elapsed();
        if options.diagnostics {
            result.diagnostics.push(Diagnostic::info(format!(
                "Total compilation time: {}ms",
                result.elapsed.as_millis()
            )));
        }
        tracing::debug!(
            command = ?options.command,
            exit_code = result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "compilation finished"
        );
        result
    }

    async fn build_command(
        &self,
        options: &CompilerOptions,
        mut diagnostics: Diagnostics,
    ) -> CompilationResult {
        match self.build(options, &mut diagnostics).await {
            Ok(output) => CompilationResult::succeeded(diagnostics, Some(output)),
            Err(code) => CompilationResult::failed(code, diagnostics),
        }
    }

    async fn run_command(
        &self,
        options: &CompilerOptions,
        mut diagnostics: Diagnostics,
    ) -> CompilationResult {
        let output = match self.build(options, &mut diagnostics).await {
            Ok(output) => output,
            Err(code) => return CompilationResult::failed(code, diagnostics),
        };
        if options.diagnostics {
            diagnostics.push(Diagnostic::info("Starting execution phase"));
        }

        let mut args = vec![output.display().to_string()];
        args.extend(options.args.iter().cloned());
        let run = match self.runner.run(&self.dotnet, &args).await {
            Ok(run) => run,
            Err(error) => {
                diagnostics.push(Diagnostic::error(format!("Execution failed: {}", error)));
                return CompilationResult::failed(exit_code::RUN, diagnostics);
            }
        };

        let mut result = if run.success() {
            CompilationResult::succeeded(diagnostics, Some(output))
        } else {
            diagnostics.push(Diagnostic::info(format!(
                "Program exited with code: {}",
                run.exit_code
            )));
            CompilationResult {
                output_path: Some(output),
                ..CompilationResult::failed(exit_code::RUN, diagnostics)
            }
        };
        result.stdout = Some(run.stdout);
        result.stderr = Some(run.stderr);
        result
    }

    /// Lower, generate and write the executable; returns its path
    async fn build(&self, options: &CompilerOptions, diagnostics: &mut Diagnostics) -> Stage<PathBuf> {
        let assembly = generate(options, diagnostics)?;

        let Some(output) = options.output.as_deref() else {
            diagnostics.push(Diagnostic::error(
                "Output path must be specified for build and run commands",
            ));
            return Err(exit_code::FAILURE);
        };
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(error) = std::fs::create_dir_all(parent) {
                diagnostics.push(Diagnostic::error(format!(
                    "Cannot create output directory {}: {}",
                    parent.display(),
                    error
                )));
                return Err(exit_code::ASSEMBLY);
            }
        }
        if options.diagnostics {
            diagnostics.push(Diagnostic::info("Starting assembly phase"));
        }

        match options.backend {
            Backend::Direct => {
                if !fifth_pe::emit(&assembly, output) {
                    diagnostics.push(Diagnostic::error(
                        CompileError::Emission(output.to_path_buf()).to_string(),
                    ));
                    return Err(exit_code::ASSEMBLY);
                }
            }
            Backend::IlAsm => self.assemble(&assembly, output, options.keep_temp, diagnostics).await?,
        }

        if let Err(error) = write_runtime_config(output) {
            diagnostics.push(Diagnostic::warning(format!(
                "Failed to write runtime configuration: {}",
                error
            )));
        }
        Ok(output.to_path_buf())
    }

    async fn assemble(
        &self,
        assembly: &AssemblyIr,
        output: &Path,
        keep_temp: bool,
        diagnostics: &mut Diagnostics,
    ) -> Stage<()> {
        let assembler = match require_assembler(&self.locator) {
            Ok(assembler) => assembler,
            Err(error) => {
                diagnostics.push(Diagnostic::error(error.to_string()));
                return Err(exit_code::ASSEMBLY);
            }
        };
        match assemble(&self.runner, &assembler, assembly, output, keep_temp).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => {
                diagnostics.push(Diagnostic::error(message));
                Err(exit_code::ASSEMBLY)
            }
            Err(error) => {
                diagnostics.push(Diagnostic::error(error.to_string()));
                Err(exit_code::ASSEMBLY)
            }
        }
    }
}

fn lint_command(options: &CompilerOptions, mut diagnostics: Diagnostics) -> CompilationResult {
    match lowered(options, options.up_to, &mut diagnostics) {
        Ok(_) => CompilationResult::succeeded(diagnostics, None),
        Err(code) => CompilationResult::failed(code, diagnostics),
    }
}

/// Parse the syntax tree and lower it up to `up_to`
fn lowered(
    options: &CompilerOptions,
    up_to: AnalysisPhase,
    diagnostics: &mut Diagnostics,
) -> Stage<(Rc<AssemblyDef>, &'static SignatureDb)> {
    let Some(source) = options.source.as_deref() else {
        diagnostics.push(Diagnostic::error("Source file or directory must be specified"));
        return Err(exit_code::FAILURE);
    };
    if options.diagnostics {
        diagnostics.push(Diagnostic::info("Starting parse phase"));
    }
    let ast = match parse::load_program(source, &options.additional_sources) {
        Ok(ast) => ast,
        Err(error) => {
            diagnostics.push(Diagnostic::error(error.to_string()));
            return Err(exit_code::PARSE);
        }
    };

    let host = match SignatureDb::builtin() {
        Ok(host) => host,
        Err(error) => {
            diagnostics.push(Diagnostic::error(CompileError::from(error).to_string()));
            return Err(exit_code::FAILURE);
        }
    };
    if options.diagnostics {
        diagnostics.push(Diagnostic::info("Starting transform phase"));
    }
    match apply_phases(&ast, host, diagnostics, up_to) {
        Some(lowered) => Ok((lowered, host)),
        None => Err(exit_code::TRANSFORM),
    }
}

/// Lower the whole program and generate its assembly
fn generate(options: &CompilerOptions, diagnostics: &mut Diagnostics) -> Stage<AssemblyIr> {
    let (lowered, host) = lowered(options, AnalysisPhase::All, diagnostics)?;
    if options.diagnostics {
        diagnostics.push(Diagnostic::info("Starting code generation phase"));
    }
    let assembly = build_assembly(&lowered, host);

    let mut valid = true;
    for ty in &assembly.types {
        for method in &ty.methods {
            if let Err(error) = verify_method(method) {
                diagnostics.push(Diagnostic::error(format!(
                    "Invalid IL in {}::{}: {}",
                    ty.name, method.name, error
                )));
                valid = false;
            }
        }
    }
    if valid {
        Ok(assembly)
    } else {
        Err(exit_code::TRANSFORM)
    }
}

/// `<name>.runtimeconfig.json` beside `executable`
pub fn runtime_config_path(executable: &Path) -> PathBuf {
    let stem = executable
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    executable.with_file_name(format!("{}.runtimeconfig.json", stem))
}

fn write_runtime_config(executable: &Path) -> Result<(), CompileError> {
    let config = serde_json::json!({
        "runtimeOptions": {
            "tfm": "net8.0",
            "framework": {
                "name": "Microsoft.NETCore.App",
                "version": "8.0.0"
            }
        }
    });
    let path = runtime_config_path(executable);
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
    tracing::debug!(path = %path.display(), "wrote runtime configuration");
    Ok(())
}
