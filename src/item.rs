//! Shared logical item, posting, and stats types (spec.md §3).

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Opaque, store-assigned identifier for an `Item`. Stable for the item's
/// lifetime and never reused by a given store instance.
pub type ItemId = u64;

/// High-level kind of an indexable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Class,
    Method,
    Function,
    Variable,
    Interface,
    Enum,
    Namespace,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Class => "class",
            ItemKind::Method => "method",
            ItemKind::Function => "function",
            ItemKind::Variable => "variable",
            ItemKind::Interface => "interface",
            ItemKind::Enum => "enum",
            ItemKind::Namespace => "namespace",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "file" => ItemKind::File,
            "class" => ItemKind::Class,
            "method" => ItemKind::Method,
            "function" => ItemKind::Function,
            "variable" => ItemKind::Variable,
            "interface" => ItemKind::Interface,
            "enum" => ItemKind::Enum,
            "namespace" => ItemKind::Namespace,
            _ => return None,
        })
    }
}

/// A single indexable entity: a file or a named symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Unique across items; a workspace-relative path for files, an
    /// absolute file path for symbols.
    pub path: String,
    /// Short label used for ranking (basename for files, symbol name for
    /// symbols).
    pub name: String,
    pub kind: ItemKind,
    /// Enclosing file item's id, for symbols. Deleting the parent
    /// cascades to children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    /// Free-form attribute bag (container name, source range, etc).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A new item not yet assigned an id by the store.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    pub parent_id: Option<ItemId>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update for `IndexStore::update_item`; `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub path: Option<String>,
    pub name: Option<String>,
    pub kind: Option<ItemKind>,
    pub parent_id: Option<Option<ItemId>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

/// A single `(trigram, item_id, position)` posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrigramPosting {
    pub trigram: String,
    pub item_id: ItemId,
    pub position: u32,
}

/// A single `(token, item_id, position)` posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenPosting {
    pub token: String,
    pub item_id: ItemId,
    pub position: u32,
}

/// Aggregate index totals, derivable at any time from the tables.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub items: u64,
    pub distinct_trigrams: u64,
    pub distinct_tokens: u64,
    pub updated_at: SystemTime,
}
