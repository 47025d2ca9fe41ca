//! Running external programs
//!
//! The assembler and the compiled program are the only processes the driver
//! starts. Both go through [`ProcessRunner`] so tests can script them.

use crate::error::{CompileError, CompileResult};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Starts a program, waits for it and captures its output
pub trait ProcessRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
    ) -> impl Future<Output = CompileResult<ProcessOutput>> + Send;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> CompileResult<ProcessOutput> {
        tracing::debug!(program = %program.display(), ?args, "starting process");
        let start = Instant::now();
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            program = %program.display(),
            exit_code = result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "process finished"
        );
        Ok(result)
    }
}

/// First `max_lines` lines of `text`, with a marker when lines were dropped
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let total = text.lines().count();
    if total <= max_lines {
        return text.trim_end().to_string();
    }
    let mut kept: Vec<&str> = text.lines().take(max_lines).collect();
    let omitted = format!("... ({} more lines)", total - max_lines);
    kept.push(&omitted);
    kept.join("\n")
}
