//! Public Search Façade (spec.md §4.7): the stable entry points hosts
//! embed against. Owns the storage adapter exclusively and serializes
//! `search` against `refresh`/initialization the way §5 requires.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::builder::collaborators::{IgnoreWalkEnumerator, NullSymbolProvider, SymbolProvider, WorkspaceEnumerator};
use crate::builder::{Builder, NullProgressSink, ProgressSink};
use crate::config::{EngineConfig, StorageKind};
use crate::error::EngineError;
use crate::item::Stats;
use crate::query::{self, RankedItem};
use crate::storage::memory::MemoryStore;
use crate::storage::sqlite::SqliteStore;
use crate::storage::IndexStore;

struct State {
    store: Box<dyn IndexStore>,
    builder: Builder,
    initialized: bool,
}

/// Stable entry points an embedding host calls: `initialize`, `search`,
/// `refresh`, `shutdown`, plus a `stats` accessor.
pub struct SearchEngine {
    config: EngineConfig,
    state: Mutex<State>,
}

impl SearchEngine {
    /// Build a façade rooted at `workspace_root`, using the default
    /// filesystem enumerator and no symbol provider. For a SQLite backend
    /// the index file lives at `index_path`.
    pub fn open(
        workspace_root: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let root = workspace_root.into();
        let enumerator: Box<dyn WorkspaceEnumerator> =
            Box::new(IgnoreWalkEnumerator::new(root.clone()));
        let symbol_provider: Box<dyn SymbolProvider> = Box::new(NullSymbolProvider);
        Self::with_collaborators(root, index_path, config, enumerator, symbol_provider)
    }

    /// Build a façade with caller-supplied collaborators (spec.md §6),
    /// e.g. a language-server-backed `SymbolProvider`.
    pub fn with_collaborators(
        workspace_root: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        config: EngineConfig,
        enumerator: Box<dyn WorkspaceEnumerator>,
        symbol_provider: Box<dyn SymbolProvider>,
    ) -> Result<Self, EngineError> {
        let root = workspace_root.into();
        let store: Box<dyn IndexStore> = match config.storage {
            StorageKind::Memory => Box::new(MemoryStore::new()),
            StorageKind::Persistent => Box::new(SqliteStore::open(&index_path.into())?),
        };

        let builder = Builder::new(root, &config, enumerator, symbol_provider)?;

        Ok(Self {
            config,
            state: Mutex::new(State {
                store,
                builder,
                initialized: false,
            }),
        })
    }

    /// Idempotent: a second call after a successful initialize is a
    /// cheap no-op. Concurrent callers serialize on the internal lock, so
    /// they effectively share the same in-flight build.
    pub fn initialize(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        self.initialize_locked(&mut state)
    }

    fn initialize_locked(&self, state: &mut State) -> Result<(), EngineError> {
        if state.initialized {
            return Ok(());
        }

        state.store.initialize()?;
        let needs_build = state.store.stats()?.items == 0;
        if needs_build {
            tracing::info!("no existing index found, running initial build");
            let mut progress = NullProgressSink;
            let cancel = AtomicBool::new(false);
            state.builder.build(&mut *state.store, &mut progress, &cancel)?;
        }
        state.initialized = true;
        Ok(())
    }

    /// Run the initial build with a caller-supplied progress sink and
    /// cancellation flag, bypassing the implicit build `initialize` would
    /// otherwise trigger on first use.
    pub fn initialize_with_progress(
        &self,
        progress: &mut dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.initialized {
            return Ok(());
        }
        state.store.initialize()?;
        if state.store.stats()?.items == 0 {
            state.builder.build(&mut *state.store, progress, cancel)?;
        }
        state.initialized = true;
        Ok(())
    }

    /// Query the index, initializing first if necessary.
    pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<RankedItem>, EngineError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        self.initialize_locked(&mut state)?;

        let effective_limit = limit.min(self.config.max_results);
        // `query::search` applies the include_files/include_symbols kind
        // filter itself, before truncating to `effective_limit`.
        let results = query::search(&*state.store, &self.config, query_text, effective_limit)?;

        tracing::debug!(query = query_text, hits = results.len(), "search completed");
        Ok(results)
    }

    /// `clear` followed by a fresh initial build. Blocks any concurrent
    /// `search` until it completes, per the §5 barrier requirement.
    pub fn refresh(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        tracing::info!("refreshing index");
        let mut progress = NullProgressSink;
        let cancel = AtomicBool::new(false);
        state.builder.refresh(&mut *state.store, &mut progress, &cancel)?;
        state.initialized = true;
        Ok(())
    }

    /// Force a final flush and release resources. Safe to call more than
    /// once.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        let state = self.state.lock().expect("state mutex poisoned");
        state.store.checkpoint()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<Stats, EngineError> {
        let state = self.state.lock().expect("state mutex poisoned");
        Ok(state.store.stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn initialize_then_search_finds_indexed_file() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("search_engine.rs"), "pub fn run() {}").unwrap();

        let mut config = EngineConfig::default();
        config.storage = StorageKind::Memory;

        let engine = SearchEngine::open(dir.path(), dir.path().join("index.sqlite"), config)
            .expect("open");
        engine.initialize().expect("initialize");

        let results = engine.search("search_engine", 10).expect("search");
        assert!(results.iter().any(|r| r.item.name == "search_engine.rs"));
    }

    #[test]
    fn refresh_rebuilds_after_file_added_out_of_band() {
        let dir = tempdir().expect("tempdir");
        let mut config = EngineConfig::default();
        config.storage = StorageKind::Memory;

        let engine = SearchEngine::open(dir.path(), dir.path().join("index.sqlite"), config)
            .expect("open");
        engine.initialize().expect("initialize");
        assert_eq!(engine.stats().unwrap().items, 0);

        fs::write(dir.path().join("added.rs"), "fn added() {}").unwrap();
        engine.refresh().expect("refresh");

        let results = engine.search("added", 10).expect("search");
        assert!(results.iter().any(|r| r.item.name == "added.rs"));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let mut config = EngineConfig::default();
        config.storage = StorageKind::Memory;

        let engine = SearchEngine::open(dir.path(), dir.path().join("index.sqlite"), config)
            .expect("open");
        engine.initialize().expect("initialize");
        engine.shutdown().expect("shutdown once");
        engine.shutdown().expect("shutdown twice");
    }
}
