//! Engine configuration (spec.md §6). Defaults are normative; every field
//! can be overridden from a `codesearch.toml` file or the CLI.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Which storage backend the façade should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Persistent,
    Memory,
}

impl Default for StorageKind {
    fn default() -> Self {
        StorageKind::Persistent
    }
}

/// Full set of recognized engine options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub include_files: bool,
    pub include_symbols: bool,
    pub max_results: usize,
    pub exclude_patterns: Vec<String>,
    pub case_sensitive: bool,
    pub min_trigram_length: usize,
    pub enable_camelcase: bool,
    pub batch_size: usize,
    pub storage: StorageKind,
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_files: true,
            include_symbols: true,
            max_results: 50,
            exclude_patterns: Vec::new(),
            case_sensitive: false,
            min_trigram_length: 3,
            enable_camelcase: true,
            batch_size: 10_000,
            storage: StorageKind::Persistent,
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits. Returns defaults unchanged if `path` does not exist.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }
}
