//! Fifth compiler CLI
//!
//! `fifthc build|run|lint|help`. The process exit code is the compilation
//! result's exit code.

mod output;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fifth_compiler::{Backend, Command, Compiler, CompilerOptions, ProjectConfig};
use fifth_semantic::AnalysisPhase;
use std::path::PathBuf;

/// Environment variable holding the log filter
const LOG_VAR: &str = "FIFTH_LOG";

#[derive(Parser)]
#[command(name = "fifthc")]
#[command(about = "Fifth language compiler", long_about = None)]
#[command(version, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Colored output: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower and compile a syntax tree to an executable (default)
    Build {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Build, then execute the produced binary
    Run {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Arguments passed to the program
        #[arg(long, num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Lower only and report problems
    Lint {
        #[command(flatten)]
        source: SourceArgs,
        /// Last lowering phase to run
        #[arg(long, value_name = "PHASE")]
        up_to: Option<AnalysisPhase>,
    },

    /// Show usage
    Help,
}

#[derive(Args, Default)]
struct SourceArgs {
    /// Syntax tree file, or a directory holding one
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Further syntax trees merged into the program
    #[arg(long = "additional", value_name = "PATH")]
    additional_sources: Vec<PathBuf>,
    /// Report phase progress and timings
    #[arg(long)]
    diagnostics: bool,
    /// Keep intermediate files
    #[arg(long)]
    keep_temp: bool,
}

#[derive(Args, Default)]
struct OutputArgs {
    /// Output executable path
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// How the executable is produced: direct or ilasm
    #[arg(long, value_parser = parse_backend)]
    backend: Option<Backend>,
}

fn parse_backend(value: &str) -> Result<Backend, String> {
    match value.to_ascii_lowercase().as_str() {
        "direct" => Ok(Backend::Direct),
        "ilasm" => Ok(Backend::IlAsm),
        other => Err(format!("unknown backend '{}' (expected direct or ilasm)", other)),
    }
}

impl Commands {
    fn into_options(self) -> CompilerOptions {
        let (command, source, output, args, up_to) = match self {
            Commands::Build { source, output } => (Command::Build, source, output, Vec::new(), None),
            Commands::Run {
                source,
                output,
                args,
            } => (Command::Run, source, output, args, None),
            Commands::Lint { source, up_to } => {
                (Command::Lint, source, OutputArgs::default(), Vec::new(), up_to)
            }
            Commands::Help => (
                Command::Help,
                SourceArgs::default(),
                OutputArgs::default(),
                Vec::new(),
                None,
            ),
        };
        CompilerOptions {
            command,
            source: source.source,
            additional_sources: source.additional_sources,
            output: output.output,
            args,
            keep_temp: source.keep_temp,
            diagnostics: source.diagnostics,
            backend: output.backend.unwrap_or_default(),
            up_to: up_to.unwrap_or_default(),
        }
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    let color = output::resolve_color_choice(cli.color.as_deref());

    let command = cli.command.unwrap_or(Commands::Build {
        source: SourceArgs::default(),
        output: OutputArgs::default(),
    });
    let mut options = command.into_options();
    if let Some(source) = options.source.as_deref() {
        let project = ProjectConfig::discover(source)
            .with_context(|| format!("Loading project settings for {}", source.display()))?;
        if let Some(project) = project {
            options = options.with_project(&project);
        }
    }

    tracing::debug!(command = ?options.command, source = ?options.source, backend = ?options.backend, "options resolved");
    let result = Compiler::from_env().compile(&options).await;
    output::print_program_output(&result);
    result.diagnostics.print(color);
    if options.diagnostics {
        output::print_summary(&result, color);
    }
    std::process::exit(result.exit_code);
}
