//! Precomputed host signature table
//!
//! The compiler ships a JSON table describing the public surface of the host
//! types Fifth programs call into: the base runtime (`System.*`), the console,
//! and the Fifth standard library (IO, math, lists, knowledge graphs).

use crate::error::{SignatureDbError, SignatureDbResult};
use crate::host::HostType;
use crate::signature::{HostTypeProvider, MethodSignature, TypeInfo};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use serde::Deserialize;

const BUILTIN_SIGNATURES: &str = include_str!("signatures.json");

static BUILTIN: OnceCell<SignatureDb> = OnceCell::new();

#[derive(Debug, Deserialize)]
struct RawTable {
    types: Vec<TypeInfo>,
    #[serde(default)]
    builtin_hosts: Vec<HostType>,
    #[serde(default)]
    extension_hosts: Vec<HostType>,
}

/// Signature table indexed by type name
#[derive(Debug)]
pub struct SignatureDb {
    types: Vec<TypeInfo>,
    by_name: FxHashMap<HostType, usize>,
    by_simple_name: FxHashMap<String, usize>,
    builtin_hosts: Vec<HostType>,
    extension_hosts: Vec<HostType>,
}

impl SignatureDb {
    /// Build a table from type descriptions.
    ///
    /// Simple-name lookup resolves to the first type registered under that
    /// name, so earlier entries win (`Math` is `System.Math` when it precedes
    /// `Fifth.System.Math`).
    pub fn new(
        types: Vec<TypeInfo>,
        builtin_hosts: Vec<HostType>,
        extension_hosts: Vec<HostType>,
    ) -> SignatureDbResult<Self> {
        let mut types = types;
        let mut by_name = FxHashMap::default();
        let mut by_simple_name = FxHashMap::default();

        for (index, info) in types.iter_mut().enumerate() {
            for method in &mut info.methods {
                method.declaring_type = info.name.clone();
            }
            if by_name.insert(info.name.clone(), index).is_some() {
                return Err(SignatureDbError::DuplicateType {
                    name: info.name.to_string(),
                });
            }
            by_simple_name
                .entry(info.name.simple_name().to_string())
                .or_insert(index);
        }

        for host in builtin_hosts.iter().chain(extension_hosts.iter()) {
            if !by_name.contains_key(host) {
                return Err(SignatureDbError::UnknownHost {
                    name: host.to_string(),
                });
            }
        }

        tracing::debug!(types = types.len(), "indexed signature table");

        Ok(Self {
            types,
            by_name,
            by_simple_name,
            builtin_hosts,
            extension_hosts,
        })
    }

    /// Parse a table from its JSON form
    pub fn from_json(text: &str) -> SignatureDbResult<Self> {
        let raw: RawTable = serde_json::from_str(text)?;
        Self::new(raw.types, raw.builtin_hosts, raw.extension_hosts)
    }

    /// The table shipped with the compiler
    pub fn builtin() -> SignatureDbResult<&'static SignatureDb> {
        BUILTIN.get_or_try_init(|| SignatureDb::from_json(BUILTIN_SIGNATURES))
    }

    /// All described types
    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }
}

impl HostTypeProvider for SignatureDb {
    fn type_info(&self, ty: &HostType) -> Option<&TypeInfo> {
        self.by_name.get(ty).map(|&index| &self.types[index])
    }

    fn find_type(&self, name: &str) -> Option<&TypeInfo> {
        self.by_name
            .get(&HostType::new(name))
            .or_else(|| self.by_simple_name.get(name))
            .map(|&index| &self.types[index])
    }

    fn lookup(&self, ty: &HostType, name: &str) -> Vec<&MethodSignature> {
        self.type_info(ty)
            .map(|info| {
                info.methods
                    .iter()
                    .filter(|m| m.is_static && m.name == name)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn builtin_hosts(&self) -> &[HostType] {
        &self.builtin_hosts
    }

    fn extension_hosts(&self) -> &[HostType] {
        &self.extension_hosts
    }
}
