//! External collaborator seams (spec.md §6): the workspace enumerator, the
//! symbol provider, and the file-change notifier. The core ships a
//! filesystem-backed enumerator grounded on `ignore`/`globset` and
//! empty-by-default stand-ins for the other two, since a language-server
//! symbol table and a live file watcher are host concerns outside this
//! crate's scope.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use ignore::WalkBuilder;

use crate::error::EngineError;
use crate::item::ItemKind;

/// Returns the set of file paths a build should index.
pub trait WorkspaceEnumerator: Send {
    fn enumerate(&self, exclude: &GlobSet) -> Result<Vec<PathBuf>, EngineError>;
}

/// One symbol reported by a language-aware collaborator.
#[derive(Debug, Clone)]
pub struct SymbolDescriptor {
    pub name: String,
    pub kind: ItemKind,
    pub container: Option<String>,
    pub file: PathBuf,
    pub range: Option<serde_json::Value>,
}

/// Returns the workspace's flat symbol list. May return an empty list if
/// no symbol source is available.
pub trait SymbolProvider: Send {
    fn symbols(&self) -> Result<Vec<SymbolDescriptor>, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Polled for pending file-change events. The façade owns the concrete
/// watcher and calls `poll` on its own timer; the core never spawns one
/// itself.
pub trait FileChangeNotifier: Send {
    fn poll(&mut self) -> Vec<FileChangeEvent>;
}

/// Walks the workspace root with `ignore::WalkBuilder`, honoring
/// `.gitignore`/`.ignore` files the way a typical developer tool does,
/// plus the caller-supplied exclusion globs.
pub struct IgnoreWalkEnumerator {
    root: PathBuf,
}

impl IgnoreWalkEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspaceEnumerator for IgnoreWalkEnumerator {
    fn enumerate(&self, exclude: &GlobSet) -> Result<Vec<PathBuf>, EngineError> {
        let mut out = Vec::new();
        let walker = WalkBuilder::new(&self.root).hidden(false).build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if exclude.is_match(relative) {
                continue;
            }
            out.push(path.to_path_buf());
        }

        Ok(out)
    }
}

/// Default symbol provider used when no language-server integration is
/// wired up; the Builder treats an empty list as "no symbols discovered".
pub struct NullSymbolProvider;

impl SymbolProvider for NullSymbolProvider {
    fn symbols(&self) -> Result<Vec<SymbolDescriptor>, EngineError> {
        Ok(Vec::new())
    }
}

/// Default notifier used when no live watcher is wired up; `poll` always
/// returns no events, so the Builder relies entirely on `refresh`.
pub struct NullFileChangeNotifier;

impl FileChangeNotifier for NullFileChangeNotifier {
    fn poll(&mut self) -> Vec<FileChangeEvent> {
        Vec::new()
    }
}

/// Built-in exclusion set, unioned with any caller-supplied globs:
/// version control, dependency caches, build outputs, and editor scratch.
pub fn default_exclusions() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/.hg/**".to_string(),
        "**/.svn/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/.cache/**".to_string(),
        "**/*.swp".to_string(),
        "**/*~".to_string(),
    ]
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(globset::Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
