//! Sharded in-memory storage backend (spec.md §4.3).
//!
//! The inverted indexes are partitioned into fixed-size shard arrays keyed
//! by the leading code units of each term, bypassing the container-size
//! ceilings some runtimes impose on a single hash map. Shards are
//! allocated lazily on first insertion and freed when emptied by
//! deletions, so memory scales with active term cardinality.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::item::{Item, ItemId, ItemKind, ItemPatch, NewItem, Stats};
use crate::storage::{dedup_terms, IndexStore};

const TRIGRAM_SHARD_COUNT: usize = 65_536;
const TOKEN_SHARD_COUNT: usize = 256;

type PostingMap = HashMap<ItemId, HashSet<u32>>;
type TermShard = HashMap<String, PostingMap>;

fn code_unit(ch: char) -> u8 {
    // All legal trigram/token characters come from the normalizer's
    // restricted alphabet ([A-Za-z0-9_\- ]), which is pure ASCII.
    if (ch as u32) < 128 {
        ch as u8
    } else {
        0
    }
}

fn trigram_shard_index(trigram: &str) -> usize {
    let mut chars = trigram.chars();
    let b0 = chars.next().map(code_unit).unwrap_or(0) as usize;
    let b1 = chars.next().map(code_unit).unwrap_or(0) as usize;
    (b0 << 8) | b1
}

fn token_shard_index(token: &str) -> usize {
    token.chars().next().map(code_unit).unwrap_or(0) as usize
}

/// A fixed-size array of lazily-allocated term shards.
struct ShardedIndex {
    shards: Vec<Option<TermShard>>,
    active_shards: usize,
}

impl ShardedIndex {
    fn new(len: usize) -> Self {
        let mut shards = Vec::with_capacity(len);
        shards.resize_with(len, || None);
        Self {
            shards,
            active_shards: 0,
        }
    }

    fn add(&mut self, shard_idx: usize, term: &str, item_id: ItemId, position: u32) {
        let shard = &mut self.shards[shard_idx];
        if shard.is_none() {
            *shard = Some(HashMap::new());
            self.active_shards += 1;
        }
        let shard = shard.as_mut().expect("just allocated");
        shard
            .entry(term.to_string())
            .or_insert_with(HashMap::new)
            .entry(item_id)
            .or_insert_with(HashSet::new)
            .insert(position);
    }

    fn remove_item(&mut self, item_id: ItemId) {
        for slot in self.shards.iter_mut() {
            let Some(shard) = slot else { continue };
            shard.retain(|_, postings| {
                postings.remove(&item_id);
                !postings.is_empty()
            });
            if shard.is_empty() {
                *slot = None;
                self.active_shards -= 1;
            }
        }
    }

    fn search(&self, shard_idx: usize, term: &str, counts: &mut HashMap<ItemId, u32>) {
        let Some(shard) = &self.shards[shard_idx] else {
            return;
        };
        let Some(postings) = shard.get(term) else {
            return;
        };
        for &item_id in postings.keys() {
            *counts.entry(item_id).or_insert(0) += 1;
        }
    }

    fn unique_terms(&self) -> u64 {
        self.shards
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|s| s.len() as u64)
            .sum()
    }
}

/// Sharded, transaction-free in-memory implementation of `IndexStore`.
pub struct MemoryStore {
    items: HashMap<ItemId, Item>,
    items_by_path: HashMap<String, ItemId>,
    next_id: ItemId,
    trigram_index: ShardedIndex,
    token_index: ShardedIndex,
    updated_at: SystemTime,
    initialized: bool,
    in_transaction: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            items_by_path: HashMap::new(),
            next_id: 1,
            trigram_index: ShardedIndex::new(TRIGRAM_SHARD_COUNT),
            token_index: ShardedIndex::new(TOKEN_SHARD_COUNT),
            updated_at: SystemTime::now(),
            initialized: false,
            in_transaction: false,
        }
    }

    /// Number of currently-allocated trigram shards; exposed for
    /// observability per spec.md §4.3.
    pub fn active_trigram_shards(&self) -> usize {
        self.trigram_index.active_shards
    }

    /// Number of currently-allocated token shards; exposed for
    /// observability per spec.md §4.3.
    pub fn active_token_shards(&self) -> usize {
        self.token_index.active_shards
    }

    fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

impl IndexStore for MemoryStore {
    fn initialize(&mut self) -> Result<(), StorageError> {
        self.initialized = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.in_transaction = false;
        self.items.clear();
        self.items_by_path.clear();
        self.next_id = 1;
        self.trigram_index = ShardedIndex::new(TRIGRAM_SHARD_COUNT);
        self.token_index = ShardedIndex::new(TOKEN_SHARD_COUNT);
        self.touch();
        Ok(())
    }

    fn add_item(&mut self, item: NewItem) -> Result<Item, StorageError> {
        if self.items_by_path.contains_key(&item.path) {
            return Err(StorageError::DuplicatePath(item.path));
        }

        let id = self.next_id;
        self.next_id += 1;

        let record = Item {
            id,
            path: item.path,
            name: item.name,
            kind: item.kind,
            parent_id: item.parent_id,
            metadata: item.metadata,
        };

        self.items_by_path.insert(record.path.clone(), id);
        self.items.insert(id, record.clone());
        self.touch();
        Ok(record)
    }

    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<Item, StorageError> {
        let existing_path = {
            let item = self.items.get(&id).ok_or(StorageError::NotFound)?;
            item.path.clone()
        };

        if let Some(new_path) = &patch.path {
            if new_path != &existing_path && self.items_by_path.contains_key(new_path) {
                return Err(StorageError::DuplicatePath(new_path.clone()));
            }
        }

        let item = self.items.get_mut(&id).ok_or(StorageError::NotFound)?;

        if let Some(path) = patch.path {
            item.path = path;
        }
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(kind) = patch.kind {
            item.kind = kind;
        }
        if let Some(parent_id) = patch.parent_id {
            item.parent_id = parent_id;
        }
        if let Some(metadata) = patch.metadata {
            item.metadata = metadata;
        }

        let updated = item.clone();
        if updated.path != existing_path {
            self.items_by_path.remove(&existing_path);
            self.items_by_path.insert(updated.path.clone(), id);
        }

        self.touch();
        Ok(updated)
    }

    fn delete_item(&mut self, id: ItemId) -> Result<(), StorageError> {
        let Some(item) = self.items.remove(&id) else {
            return Ok(());
        };
        self.items_by_path.remove(&item.path);
        self.trigram_index.remove_item(id);
        self.token_index.remove_item(id);

        let children: Vec<ItemId> = self
            .items
            .values()
            .filter(|i| i.parent_id == Some(id))
            .map(|i| i.id)
            .collect();
        for child in children {
            self.delete_item(child)?;
        }

        self.touch();
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StorageError> {
        Ok(self.items.get(&id).cloned())
    }

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>, StorageError> {
        Ok(self
            .items_by_path
            .get(path)
            .and_then(|id| self.items.get(id))
            .cloned())
    }

    fn all_items(&self) -> Result<Vec<Item>, StorageError> {
        Ok(self.items.values().cloned().collect())
    }

    fn add_trigrams(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError> {
        for (trigram, item_id, position) in postings {
            let idx = trigram_shard_index(trigram);
            self.trigram_index.add(idx, trigram, *item_id, *position);
        }
        self.touch();
        Ok(())
    }

    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        self.trigram_index.remove_item(item_id);
        self.touch();
        Ok(())
    }

    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>, StorageError> {
        let mut counts = HashMap::new();
        for term in dedup_terms(trigrams) {
            let idx = trigram_shard_index(&term);
            self.trigram_index.search(idx, &term, &mut counts);
        }
        Ok(counts)
    }

    fn add_tokens(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError> {
        for (token, item_id, position) in postings {
            let idx = token_shard_index(token);
            self.token_index.add(idx, token, *item_id, *position);
        }
        self.touch();
        Ok(())
    }

    fn remove_tokens(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        self.token_index.remove_item(item_id);
        self.touch();
        Ok(())
    }

    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>, StorageError> {
        let mut counts = HashMap::new();
        for term in dedup_terms(tokens) {
            let idx = token_shard_index(&term);
            self.token_index.search(idx, &term, &mut counts);
        }
        Ok(counts)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.in_transaction {
            tracing::warn!("nested begin() on MemoryStore is a no-op");
            return Ok(());
        }
        // The in-memory store has no rollback semantics; `begin` only
        // tracks nesting so a repeat call can warn instead of erroring.
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.in_transaction = false;
        Ok(())
    }

    fn stats(&self) -> Result<Stats, StorageError> {
        Ok(Stats {
            items: self.items.len() as u64,
            distinct_trigrams: self.trigram_index.unique_terms(),
            distinct_tokens: self.token_index.unique_terms(),
            updated_at: self.updated_at,
        })
    }
}
