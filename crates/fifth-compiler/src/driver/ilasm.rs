//! Locating and running the external IL assembler

use super::process::{truncate_lines, ProcessRunner};
use crate::error::{CompileError, CompileResult};
use fifth_il::{render_assembly, AssemblyIr};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable naming the assembler executable
pub const ILASM_PATH_VAR: &str = "FIFTH_ILASM_PATH";

/// Lines of assembler output kept in a failure diagnostic
pub const MAX_OUTPUT_LINES: usize = 40;

#[cfg(windows)]
const EXE_SUFFIX: &str = ".exe";
#[cfg(not(windows))]
const EXE_SUFFIX: &str = "";

fn executable(name: &str) -> String {
    format!("{}{}", name, EXE_SUFFIX)
}

/// Where to look for `ilasm`, in order:
///
/// 1. the path named by `FIFTH_ILASM_PATH`
/// 2. the runtime root (`DOTNET_ROOT`, else the directory of `dotnet` on `PATH`)
/// 3. the SDK directories under that root, newest version first
/// 4. `PATH`
#[derive(Debug, Clone, Default)]
pub struct AssemblerLocator {
    pub explicit: Option<PathBuf>,
    pub dotnet_root: Option<PathBuf>,
    pub search_path: Option<OsString>,
}

impl AssemblerLocator {
    pub fn from_env() -> Self {
        Self {
            explicit: std::env::var_os(ILASM_PATH_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            dotnet_root: std::env::var_os("DOTNET_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            if explicit.is_file() {
                return Some(explicit.clone());
            }
            tracing::warn!(path = %explicit.display(), "{} does not name a file", ILASM_PATH_VAR);
        }

        if let Some(root) = self.runtime_root() {
            let adjacent = root.join(executable("ilasm"));
            if adjacent.is_file() {
                return Some(adjacent);
            }
            if let Some(found) = scan_sdks(&root.join("sdk")) {
                return Some(found);
            }
        }

        self.on_path("ilasm")
    }

    fn runtime_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.dotnet_root {
            return root.is_dir().then(|| root.clone());
        }
        let dotnet = self.on_path("dotnet")?;
        let dir = dotnet.parent()?;
        let root = if dir.file_name().is_some_and(|n| n.eq_ignore_ascii_case("bin")) {
            dir.parent()?
        } else {
            dir
        };
        Some(root.to_path_buf())
    }

    fn on_path(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .map(|dir| dir.join(executable(name)))
            .find(|candidate| candidate.is_file())
    }
}

/// `ilasm` inside the newest versioned SDK directory that has one
fn scan_sdks(sdk_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(sdk_dir).ok()?;
    let mut versions: Vec<(Vec<u64>, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let version = parse_version(&entry.file_name().to_string_lossy())?;
            Some((version, entry.path()))
        })
        .collect();
    versions.sort_by(|a, b| b.0.cmp(&a.0));
    versions
        .into_iter()
        .map(|(_, dir)| dir.join(executable("ilasm")))
        .find(|candidate| candidate.is_file())
}

fn parse_version(name: &str) -> Option<Vec<u64>> {
    name.split('.').map(|part| part.parse().ok()).collect()
}

/// Render `assembly` as textual IL and assemble it into `output`.
///
/// The IL file is deleted afterwards unless `keep_temp` is set; a failed
/// deletion is only logged. `Ok(Err(message))` reports an assembler failure
/// with its output truncated.
pub async fn assemble<R: ProcessRunner>(
    runner: &R,
    assembler: &Path,
    assembly: &AssemblyIr,
    output: &Path,
    keep_temp: bool,
) -> CompileResult<Result<(), String>> {
    let text = render_assembly(assembly);
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-", assembly.name))
        .suffix(".il")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    let il_path = file.path().to_path_buf();
    tracing::debug!(path = %il_path.display(), bytes = text.len(), "wrote textual IL");

    let args = vec![
        il_path.display().to_string(),
        "-exe".to_string(),
        format!("-output={}", output.display()),
    ];
    let result = runner.run(assembler, &args).await;

    if keep_temp {
        match file.keep() {
            Ok((_, path)) => tracing::info!(path = %path.display(), "kept textual IL"),
            Err(error) => tracing::warn!(%error, "could not keep textual IL"),
        }
    } else if let Err(error) = file.close() {
        tracing::warn!(%error, path = %il_path.display(), "could not delete textual IL");
    }

    let result = result?;
    if result.success() {
        return Ok(Ok(()));
    }
    let combined = format!("{}\n{}", result.stdout.trim_end(), result.stderr.trim_end());
    Ok(Err(format!(
        "IL assembler exited with code {}:\n{}",
        result.exit_code,
        truncate_lines(combined.trim(), MAX_OUTPUT_LINES)
    )))
}

/// Assembler path or [`CompileError::AssemblerNotFound`]
pub fn require_assembler(locator: &AssemblerLocator) -> CompileResult<PathBuf> {
    locator.locate().ok_or(CompileError::AssemblerNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, b"").expect("create file");
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("my-ilasm");
        touch(&explicit);
        let root = dir.path().join("dotnet");
        touch(&root.join(executable("ilasm")));

        let locator = AssemblerLocator {
            explicit: Some(explicit.clone()),
            dotnet_root: Some(root),
            search_path: None,
        };
        assert_eq!(locator.locate(), Some(explicit));
    }

    #[test]
    fn test_newest_sdk_is_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("dotnet");
        touch(&root.join("sdk/6.0.100").join(executable("ilasm")));
        touch(&root.join("sdk/8.0.204").join(executable("ilasm")));
        fs::create_dir_all(root.join("sdk/9.0.100")).expect("sdk without ilasm");
        fs::create_dir_all(root.join("sdk/NuGetFallbackFolder")).expect("non-version dir");

        let locator = AssemblerLocator {
            explicit: None,
            dotnet_root: Some(root.clone()),
            search_path: None,
        };
        assert_eq!(
            locator.locate(),
            Some(root.join("sdk/8.0.204").join(executable("ilasm")))
        );
    }

    #[test]
    fn test_falls_back_to_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("tools");
        touch(&bin.join(executable("ilasm")));

        let locator = AssemblerLocator {
            explicit: Some(dir.path().join("missing")),
            dotnet_root: None,
            search_path: Some(bin.clone().into_os_string()),
        };
        assert_eq!(locator.locate(), Some(bin.join(executable("ilasm"))));
    }

    #[test]
    fn test_nothing_found() {
        let locator = AssemblerLocator::default();
        assert_eq!(locator.locate(), None);
        assert!(matches!(
            require_assembler(&locator),
            Err(CompileError::AssemblerNotFound)
        ));
    }
}
