//! Terminal output for the CLI
//!
//! Respects `NO_COLOR` and `--color`.

use fifth_compiler::CompilationResult;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from the flag and the environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Echo what the program started by `run` printed
pub fn print_program_output(result: &CompilationResult) {
    if let Some(stdout) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
        print!("{}", stdout);
        let _ = std::io::stdout().flush();
    }
    if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
        eprint!("{}", stderr);
    }
}

/// One-line outcome, e.g. `Finished in 42ms: bin/hello.exe`
pub fn print_summary(result: &CompilationResult, choice: ColorChoice) {
    let mut out = StandardStream::stdout(choice);
    let (label, color) = if result.success {
        ("Finished", Color::Green)
    } else {
        ("Failed", Color::Red)
    };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(out, "{}", label);
    let _ = out.reset();
    let _ = write!(out, " in {}ms", result.elapsed.as_millis());
    match &result.output_path {
        Some(path) => {
            let _ = writeln!(out, ": {}", path.display());
        }
        None => {
            let _ = writeln!(out, " (exit code {})", result.exit_code);
        }
    }
}
