//! Loading the serialized syntax trees produced by the parser

use crate::error::{CompileError, CompileResult};
use fifth_ast::json::{from_json, renumber};
use fifth_ast::AssemblyDef;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Extension of serialized syntax trees
pub const AST_EXTENSION: &str = "json";

/// The tree file for `source`: the file itself, or the first `.json` file
/// of a directory in name order
pub fn resolve_source(source: &Path) -> CompileResult<PathBuf> {
    if !source.is_dir() {
        return Ok(source.to_path_buf());
    }
    let entries = std::fs::read_dir(source).map_err(|e| CompileError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == AST_EXTENSION))
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::NoSources(source.to_path_buf()))
}

/// Read one tree
pub fn load_tree(path: &Path) -> CompileResult<Rc<AssemblyDef>> {
    let text = std::fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&text).map_err(|source| CompileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The main tree with the modules of every additional tree appended
pub fn load_program(source: &Path, additional: &[PathBuf]) -> CompileResult<Rc<AssemblyDef>> {
    let main = resolve_source(source)?;
    tracing::debug!(path = %main.display(), "loading syntax tree");
    let program = load_tree(&main)?;
    if additional.is_empty() {
        return Ok(program);
    }

    let mut modules = program.modules.clone();
    for extra in additional {
        let path = resolve_source(extra)?;
        tracing::debug!(path = %path.display(), "loading additional syntax tree");
        modules.extend(load_tree(&path)?.modules.iter().cloned());
    }
    Ok(renumber(&program.with_modules(modules)))
}
