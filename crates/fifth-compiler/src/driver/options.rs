//! Compiler options and the optional `fifth.toml` project file

use crate::error::{ConfigError, ConfigResult};
use fifth_semantic::AnalysisPhase;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project file looked up beside the sources
pub const PROJECT_FILE: &str = "fifth.toml";

/// What the driver is asked to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    #[default]
    Build,
    Run,
    Lint,
    Help,
}

impl Command {
    /// Whether the command writes an executable
    pub fn needs_output(self) -> bool {
        matches!(self, Command::Build | Command::Run)
    }
}

/// How the executable is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Write the image directly
    #[default]
    Direct,
    /// Render textual IL and run the external assembler
    IlAsm,
}

/// Everything one compilation needs to know
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub command: Command,
    pub source: Option<PathBuf>,
    pub additional_sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    /// Program arguments for `run`
    pub args: Vec<String>,
    /// Keep intermediate files
    pub keep_temp: bool,
    /// Verbose diagnostics
    pub diagnostics: bool,
    pub backend: Backend,
    /// Last phase `lint` runs
    pub up_to: AnalysisPhase,
}

impl CompilerOptions {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    /// Problems that stop the compilation before it starts
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.command == Command::Help {
            return errors;
        }
        match &self.source {
            None => errors.push("Source file or directory must be specified".to_string()),
            Some(source) if !source.exists() => errors.push(format!(
                "Source file or directory does not exist: {}",
                source.display()
            )),
            Some(_) => {}
        }
        if self.command.needs_output() && self.output.is_none() {
            errors.push("Output path must be specified for build and run commands".to_string());
        }
        errors
    }

    /// Fill unset options from a project file
    pub fn with_project(mut self, project: &ProjectConfig) -> Self {
        if self.output.is_none() {
            self.output = project.output.clone();
        }
        if let Some(backend) = project.backend {
            if self.backend == Backend::default() {
                self.backend = backend;
            }
        }
        self.keep_temp |= project.keep_temp;
        if self.args.is_empty() {
            self.args = project.args.clone();
        }
        self
    }
}

/// Defaults read from `fifth.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub output: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub keep_temp: bool,
    pub args: Vec<String>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The project file of `source`: beside it when `source` is a file,
    /// inside it when it is a directory
    pub fn discover(source: &Path) -> ConfigResult<Option<Self>> {
        let dir = if source.is_dir() {
            source
        } else {
            match source.parent() {
                Some(parent) => parent,
                None => return Ok(None),
            }
        };
        let path = dir.join(PROJECT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        tracing::debug!(path = %path.display(), "loading project file");
        Self::load(&path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_source_and_output() {
        let options = CompilerOptions::new(Command::Build);
        assert_eq!(
            options.validate(),
            [
                "Source file or directory must be specified",
                "Output path must be specified for build and run commands",
            ]
        );
    }

    #[test]
    fn test_nonexistent_source() {
        let mut options = CompilerOptions::new(Command::Lint);
        options.source = Some(PathBuf::from("/definitely/not/here.json"));
        assert_eq!(
            options.validate(),
            ["Source file or directory does not exist: /definitely/not/here.json"]
        );
    }

    #[test]
    fn test_help_needs_nothing() {
        assert!(CompilerOptions::new(Command::Help).validate().is_empty());
    }

    #[test]
    fn test_project_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "output = \"out/app.exe\"\nbackend = \"ilasm\"\nkeep_temp = true\nargs = [\"a\"]\n",
        )
        .expect("write project");

        let project = ProjectConfig::discover(dir.path())
            .expect("valid project")
            .expect("project present");
        let mut options = CompilerOptions::new(Command::Run);
        options.args = vec!["explicit".into()];
        let options = options.with_project(&project);

        assert_eq!(options.output, Some(PathBuf::from("out/app.exe")));
        assert_eq!(options.backend, Backend::IlAsm);
        assert!(options.keep_temp);
        assert_eq!(options.args, ["explicit"]);
    }

    #[test]
    fn test_invalid_project_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PROJECT_FILE);
        std::fs::write(&path, "keep_temp = \"yes\"").expect("write project");
        assert!(matches!(ProjectConfig::load(&path), Err(ConfigError::Toml { .. })));
    }
}
