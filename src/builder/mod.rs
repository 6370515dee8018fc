//! Index Builder / Maintainer (spec.md §4.5): drives the initial full
//! index, consumes coalesced file-change events, and orchestrates
//! incremental re-indexing and full refresh.

pub mod collaborators;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::builder::collaborators::{
    build_globset, default_exclusions, ChangeKind, SymbolProvider, WorkspaceEnumerator,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::item::{ItemId, ItemKind, NewItem};
use crate::storage::IndexStore;
use crate::text;

const PROGRESS_INTERVAL: usize = 50;

/// Reports build progress to the host; the default is silent.
pub trait ProgressSink {
    fn on_progress(&mut self, done: usize, total: Option<usize>);
}

pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&mut self, _done: usize, _total: Option<usize>) {}
}

/// Drives indexing against a storage backend. Generic over the store so
/// the façade can plug in either the in-memory or the SQLite
/// implementation without the Builder knowing which.
pub struct Builder {
    root: PathBuf,
    case_sensitive: bool,
    batch_size: usize,
    exclude: globset::GlobSet,
    enumerator: Box<dyn WorkspaceEnumerator>,
    symbol_provider: Box<dyn SymbolProvider>,
    pending: HashMap<PathBuf, ChangeKind>,
}

impl Builder {
    pub fn new(
        root: impl Into<PathBuf>,
        config: &EngineConfig,
        enumerator: Box<dyn WorkspaceEnumerator>,
        symbol_provider: Box<dyn SymbolProvider>,
    ) -> Result<Self, EngineError> {
        let mut patterns = default_exclusions();
        patterns.extend(config.exclude_patterns.iter().cloned());
        let exclude = build_globset(&patterns)?;

        Ok(Self {
            root: root.into(),
            case_sensitive: config.case_sensitive,
            batch_size: config.batch_size.max(1),
            exclude,
            enumerator,
            symbol_provider,
            pending: HashMap::new(),
        })
    }

    /// Full initial build: walk the workspace, index every file, request
    /// symbols, and index each as a child of its enclosing file.
    pub fn build(
        &mut self,
        store: &mut dyn IndexStore,
        progress: &mut dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<(), EngineError> {
        let paths = self.enumerator.enumerate(&self.exclude)?;
        let total = paths.len();

        store.begin()?;
        let mut done = 0usize;
        let mut file_ids: HashMap<PathBuf, ItemId> = HashMap::new();

        for path in &paths {
            if done % PROGRESS_INTERVAL == 0 && cancel.load(Ordering::SeqCst) {
                store.rollback()?;
                return Err(EngineError::Cancelled);
            }

            let id = self.index_file(store, path)?;
            file_ids.insert(self.relative_path(path), id);
            done += 1;

            if done % PROGRESS_INTERVAL == 0 {
                progress.on_progress(done, Some(total));
            }
            if done % self.batch_size == 0 {
                store.commit()?;
                store.begin()?;
            }
        }
        progress.on_progress(done, Some(total));

        let symbols = self.symbol_provider.symbols()?;
        let mut by_file: HashMap<PathBuf, Vec<_>> = HashMap::new();
        for symbol in symbols {
            by_file.entry(symbol.file.clone()).or_default().push(symbol);
        }

        let mut symbol_done = 0usize;
        for (file, symbols) in by_file {
            if cancel.load(Ordering::SeqCst) {
                store.rollback()?;
                return Err(EngineError::Cancelled);
            }

            let relative = self.relative_path(&file);
            let parent_id = match file_ids.get(&relative) {
                Some(id) => *id,
                None => self.index_file(store, &file)?,
            };

            for symbol in symbols {
                self.index_symbol(store, parent_id, &relative, &symbol)?;
                symbol_done += 1;
                if symbol_done % PROGRESS_INTERVAL == 0 {
                    progress.on_progress(done + symbol_done, None);
                }
                if symbol_done % self.batch_size == 0 {
                    store.commit()?;
                    store.begin()?;
                }
            }
        }

        store.commit()?;
        Ok(())
    }

    /// `clear` followed by a fresh `build`.
    pub fn refresh(
        &mut self,
        store: &mut dyn IndexStore,
        progress: &mut dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<(), EngineError> {
        store.clear()?;
        self.build(store, progress, cancel)
    }

    /// Record a file-change event, coalescing with anything already
    /// pending for the same path: create-then-delete cancels out to
    /// delete; modify after create stays create; anything after modify
    /// stays the new op unless it's a redundant modify.
    pub fn record_event(&mut self, path: PathBuf, kind: ChangeKind) {
        use ChangeKind::*;
        let entry = self.pending.entry(path).or_insert(kind);
        *entry = match (*entry, kind) {
            (Create, Delete) => Delete,
            (Create, Modify) => Create,
            (Modify, Delete) => Delete,
            (Delete, Create) => Modify,
            (_, new_kind) => new_kind,
        };
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply every coalesced pending event inside one transaction.
    pub fn process_pending(&mut self, store: &mut dyn IndexStore) -> Result<(), EngineError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let events: Vec<(PathBuf, ChangeKind)> = self.pending.drain().collect();

        store.begin()?;
        for (path, kind) in events {
            let relative = self.relative_path(&path);
            let relative_str = relative.to_string_lossy().into_owned();
            let existing = store.get_item_by_path(&relative_str)?;

            match (kind, existing) {
                (ChangeKind::Create, None) | (ChangeKind::Modify, None) => {
                    self.index_file(store, &path)?;
                }
                (ChangeKind::Create, Some(item)) | (ChangeKind::Modify, Some(item)) => {
                    store.remove_trigrams(item.id)?;
                    store.remove_tokens(item.id)?;
                    let basename = collaborators::basename(&path);
                    let text = format!("{} {}", basename, relative_str);
                    self.index_text(store, item.id, &text)?;
                }
                (ChangeKind::Delete, Some(item)) => {
                    store.delete_item(item.id)?;
                }
                (ChangeKind::Delete, None) => {}
            }
        }
        store.commit()?;
        Ok(())
    }

    fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    fn index_file(&self, store: &mut dyn IndexStore, path: &Path) -> Result<ItemId, EngineError> {
        let relative = self.relative_path(path);
        let relative_str = relative.to_string_lossy().into_owned();
        let basename = collaborators::basename(path);

        let item = store.add_item(NewItem {
            path: relative_str.clone(),
            name: basename.clone(),
            kind: ItemKind::File,
            parent_id: None,
            metadata: None,
        })?;

        let text = format!("{} {}", basename, relative_str);
        self.index_text(store, item.id, &text)?;
        Ok(item.id)
    }

    fn index_symbol(
        &self,
        store: &mut dyn IndexStore,
        parent_id: ItemId,
        parent_relative_path: &Path,
        symbol: &collaborators::SymbolDescriptor,
    ) -> Result<ItemId, EngineError> {
        let basename = collaborators::basename(parent_relative_path);
        let symbol_path = format!(
            "{}#{}",
            parent_relative_path.to_string_lossy(),
            symbol.name
        );

        let item = store.add_item(NewItem {
            path: symbol_path,
            name: symbol.name.clone(),
            kind: symbol.kind,
            parent_id: Some(parent_id),
            metadata: symbol
                .container
                .as_ref()
                .map(|c| serde_json::json!({ "container": c })),
        })?;

        let container = symbol.container.clone().unwrap_or_default();
        let text = format!("{} {} {}", symbol.name, container, basename);
        self.index_text(store, item.id, &text)?;
        Ok(item.id)
    }

    fn index_text(
        &self,
        store: &mut dyn IndexStore,
        item_id: ItemId,
        text_value: &str,
    ) -> Result<(), EngineError> {
        let trigram_postings: Vec<(String, ItemId, u32)> =
            text::trigrams(text_value, self.case_sensitive)
                .into_iter()
                .map(|(t, p)| (t, item_id, p as u32))
                .collect();
        store.add_trigrams(&trigram_postings)?;

        let token_postings: Vec<(String, ItemId, u32)> = text::tokens(text_value)
            .into_iter()
            .map(|(t, p)| {
                let folded = if self.case_sensitive { t } else { t.to_lowercase() };
                (folded, item_id, p as u32)
            })
            .collect();
        store.add_tokens(&token_postings)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::collaborators::{NullSymbolProvider, SymbolDescriptor};
    use crate::storage::memory::MemoryStore;
    use std::fs;
    use tempfile::tempdir;

    struct FixedEnumerator {
        paths: Vec<PathBuf>,
    }

    impl WorkspaceEnumerator for FixedEnumerator {
        fn enumerate(&self, _exclude: &globset::GlobSet) -> Result<Vec<PathBuf>, EngineError> {
            Ok(self.paths.clone())
        }
    }

    struct FixedSymbolProvider {
        symbols: Vec<SymbolDescriptor>,
    }

    impl SymbolProvider for FixedSymbolProvider {
        fn symbols(&self) -> Result<Vec<SymbolDescriptor>, EngineError> {
            Ok(self.symbols.clone())
        }
    }

    #[test]
    fn initial_build_indexes_files_and_symbols() {
        let dir = tempdir().expect("tempdir");
        let file_path = dir.path().join("src").join("lib.rs");
        fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        fs::write(&file_path, "fn main() {}").unwrap();

        let config = EngineConfig::default();
        let enumerator = Box::new(FixedEnumerator {
            paths: vec![file_path.clone()],
        });
        let symbols = Box::new(FixedSymbolProvider {
            symbols: vec![SymbolDescriptor {
                name: "main".to_string(),
                kind: ItemKind::Function,
                container: None,
                file: file_path.clone(),
                range: None,
            }],
        });

        let mut builder = Builder::new(dir.path(), &config, enumerator, symbols).unwrap();
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let mut progress = NullProgressSink;
        let cancel = AtomicBool::new(false);

        builder.build(&mut store, &mut progress, &cancel).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.items, 2);

        let file_item = store
            .get_item_by_path("src/lib.rs")
            .unwrap()
            .expect("file indexed");
        let symbol_item = store
            .get_item_by_path("src/lib.rs#main")
            .unwrap()
            .expect("symbol indexed");
        assert_eq!(symbol_item.parent_id, Some(file_item.id));
    }

    #[test]
    fn cancellation_rolls_back_partial_build() {
        let dir = tempdir().expect("tempdir");
        let mut paths = Vec::new();
        for i in 0..120 {
            let p = dir.path().join(format!("file{i}.rs"));
            fs::write(&p, "content").unwrap();
            paths.push(p);
        }

        let config = EngineConfig::default();
        let enumerator = Box::new(FixedEnumerator { paths });
        let symbols = Box::new(NullSymbolProvider);

        let mut builder = Builder::new(dir.path(), &config, enumerator, symbols).unwrap();
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let mut progress = NullProgressSink;
        let cancel = AtomicBool::new(true);

        let result = builder.build(&mut store, &mut progress, &cancel);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn incremental_create_then_delete_coalesces_to_delete() {
        let dir = tempdir().expect("tempdir");
        let config = EngineConfig::default();
        let enumerator = Box::new(FixedEnumerator { paths: vec![] });
        let symbols = Box::new(NullSymbolProvider);
        let mut builder = Builder::new(dir.path(), &config, enumerator, symbols).unwrap();

        let path = dir.path().join("new.rs");
        builder.record_event(path.clone(), ChangeKind::Create);
        builder.record_event(path.clone(), ChangeKind::Delete);

        assert_eq!(builder.pending.get(&path), Some(&ChangeKind::Delete));
    }

    #[test]
    fn process_pending_create_indexes_new_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("new.rs");
        fs::write(&path, "fn add() {}").unwrap();

        let config = EngineConfig::default();
        let enumerator = Box::new(FixedEnumerator { paths: vec![] });
        let symbols = Box::new(NullSymbolProvider);
        let mut builder = Builder::new(dir.path(), &config, enumerator, symbols).unwrap();

        let mut store = MemoryStore::new();
        store.initialize().unwrap();

        builder.record_event(path.clone(), ChangeKind::Create);
        builder.process_pending(&mut store).unwrap();

        let item = store.get_item_by_path("new.rs").unwrap();
        assert!(item.is_some());
        assert!(!builder.has_pending());
    }

    #[test]
    fn process_pending_delete_removes_item_and_postings() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("gone.rs");
        fs::write(&path, "fn gone() {}").unwrap();

        let config = EngineConfig::default();
        let enumerator = Box::new(FixedEnumerator {
            paths: vec![path.clone()],
        });
        let symbols = Box::new(NullSymbolProvider);
        let mut builder = Builder::new(dir.path(), &config, enumerator, symbols).unwrap();

        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let mut progress = NullProgressSink;
        let cancel = AtomicBool::new(false);
        builder.build(&mut store, &mut progress, &cancel).unwrap();

        builder.record_event(path.clone(), ChangeKind::Delete);
        builder.process_pending(&mut store).unwrap();

        assert!(store.get_item_by_path("gone.rs").unwrap().is_none());
    }
}
