//! Storage adapter contract (spec.md §4.2) and its implementations.
//!
//! `IndexStore` is the uniform interface the query engine and builder use
//! regardless of which concrete backend (sharded in-memory, or SQLite) is
//! active.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use crate::error::StorageError;
use crate::item::{Item, ItemId, ItemPatch, NewItem, Stats};

/// Pluggable storage backend: an item table plus two inverted indexes
/// (trigram→items, token→items), with bulk insert, single-item purge,
/// counted lookup, and transactional batching.
pub trait IndexStore: Send {
    /// Must be called once before any other operation; idempotent on
    /// repeat calls.
    fn initialize(&mut self) -> Result<(), StorageError>;

    /// Drop every item and posting. Rolls back any open transaction
    /// first.
    fn clear(&mut self) -> Result<(), StorageError>;

    /// Insert a new item, assigning and returning its id. Fails with
    /// `DuplicatePath` if `path` is already present.
    fn add_item(&mut self, item: NewItem) -> Result<Item, StorageError>;

    /// Apply a partial update. Fails with `NotFound` if `id` is absent.
    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<Item, StorageError>;

    /// Remove an item. Cascades to its postings and to any children
    /// whose `parent_id` references it.
    fn delete_item(&mut self, id: ItemId) -> Result<(), StorageError>;

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StorageError>;

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>, StorageError>;

    /// All items currently stored. Used by the query engine's O(N)
    /// abbreviation fallback (spec.md §4.6 step 4).
    fn all_items(&self) -> Result<Vec<Item>, StorageError>;

    /// Bulk insert trigram postings; silently ignores duplicates.
    fn add_trigrams(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError>;

    /// Remove all trigram postings for `item_id`.
    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<(), StorageError>;

    /// Counted lookup: for each candidate item, the number of *distinct*
    /// query trigrams that had at least one posting under that item.
    /// Duplicates in `trigrams` do not inflate the count.
    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>, StorageError>;

    fn add_tokens(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError>;

    fn remove_tokens(&mut self, item_id: ItemId) -> Result<(), StorageError>;

    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>, StorageError>;

    /// Begin a transaction. A nested `begin` while one is already open is
    /// a no-op that logs a warning rather than an error.
    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;

    fn stats(&self) -> Result<Stats, StorageError>;

    /// Force any pending persistence to disk. A no-op for backends with
    /// nothing to flush (e.g. the in-memory store).
    fn checkpoint(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Fold a counted-lookup query list into a deduplicated set before it
/// reaches a backend, so "duplicates do not inflate the count" holds
/// regardless of backend implementation detail.
pub(crate) fn dedup_terms(terms: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for t in terms {
        if seen.insert(t.clone()) {
            out.push(t.clone());
        }
    }
    out
}
