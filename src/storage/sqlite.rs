//! SQLite-based persistent storage backend (spec.md §4.4).
//!
//! The logical index model lives in a single SQLite database file:
//!
//! - `items(id INTEGER PRIMARY KEY, path TEXT UNIQUE, name TEXT, kind TEXT,
//!          parent_id INTEGER, metadata TEXT)`
//! - `trigrams(trigram TEXT, item_id INTEGER, position INTEGER)`
//! - `tokens(token TEXT, item_id INTEGER, position INTEGER)`
//!
//! The connection is configured for a single-writer, many-reader workload:
//! WAL journaling, `synchronous = NORMAL`, a busy timeout so concurrent
//! access doesn't surface as `database is locked`, and a memory-mapped
//! read window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};

use crate::error::StorageError;
use crate::item::{Item, ItemId, ItemKind, ItemPatch, NewItem, Stats};
use crate::storage::{dedup_terms, IndexStore};

const MMAP_SIZE_BYTES: i64 = 256 * 1024 * 1024;

/// Persistent, transactional implementation of `IndexStore` over a SQLite
/// file.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
    in_transaction: bool,
}

impl SqliteStore {
    /// Open (or create) a SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "mmap_size", MMAP_SIZE_BYTES)?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        let store = Self {
            path: path.to_path_buf(),
            conn,
            in_transaction: false,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id        INTEGER PRIMARY KEY,
                path      TEXT NOT NULL UNIQUE,
                name      TEXT NOT NULL,
                kind      TEXT NOT NULL,
                parent_id INTEGER,
                metadata  TEXT,
                FOREIGN KEY(parent_id) REFERENCES items(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS trigrams (
                trigram  TEXT NOT NULL,
                item_id  INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (trigram, item_id, position),
                FOREIGN KEY(item_id) REFERENCES items(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS tokens (
                token    TEXT NOT NULL,
                item_id  INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (token, item_id, position),
                FOREIGN KEY(item_id) REFERENCES items(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_id);
            CREATE INDEX IF NOT EXISTS idx_trigrams_trigram ON trigrams(trigram);
            CREATE INDEX IF NOT EXISTS idx_trigrams_item_id ON trigrams(item_id);
            CREATE INDEX IF NOT EXISTS idx_tokens_token ON tokens(token);
            CREATE INDEX IF NOT EXISTS idx_tokens_item_id ON tokens(item_id);
        "#,
        )?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let id: i64 = row.get(0)?;
        let path: String = row.get(1)?;
        let name: String = row.get(2)?;
        let kind_str: String = row.get(3)?;
        let parent_id: Option<i64> = row.get(4)?;
        let metadata_json: Option<String> = row.get(5)?;

        let kind = ItemKind::from_str(&kind_str).unwrap_or(ItemKind::File);
        let metadata = metadata_json.and_then(|s| serde_json::from_str(&s).ok());

        Ok(Item {
            id: id as u64,
            path,
            name,
            kind,
            parent_id: parent_id.map(|p| p as u64),
            metadata,
        })
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl IndexStore for SqliteStore {
    fn initialize(&mut self) -> Result<(), StorageError> {
        self.initialize_schema()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        if self.in_transaction {
            self.rollback()?;
        }
        self.conn.execute_batch(
            "DELETE FROM tokens; DELETE FROM trigrams; DELETE FROM items;",
        )?;
        Ok(())
    }

    fn add_item(&mut self, item: NewItem) -> Result<Item, StorageError> {
        let metadata_json = item
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Schema(e.to_string()))?;

        let result = self.conn.execute(
            "INSERT INTO items (path, name, kind, parent_id, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.path,
                item.name,
                item.kind.as_str(),
                item.parent_id.map(|p| p as i64),
                metadata_json,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid() as u64;
                Ok(Item {
                    id,
                    path: item.path,
                    name: item.name,
                    kind: item.kind,
                    parent_id: item.parent_id,
                    metadata: item.metadata,
                })
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicatePath(item.path))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<Item, StorageError> {
        // A batch transaction opened via `begin()` may already be open; in
        // that case write through `self.conn` directly the way `add_item`
        // does instead of opening a nested `rusqlite::Transaction`, which
        // SQLite would reject with "cannot start a transaction within a
        // transaction".
        let owns_transaction = !self.in_transaction;
        if owns_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        }

        let result = (|| -> Result<Item, StorageError> {
            let current = {
                let mut stmt = self.conn.prepare(
                    "SELECT id, path, name, kind, parent_id, metadata FROM items WHERE id = ?1",
                )?;
                stmt.query_row(params![id as i64], Self::row_to_item)
                    .optional()?
            };
            let Some(mut item) = current else {
                return Err(StorageError::NotFound);
            };

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

            let metadata_json = item
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| StorageError::Schema(e.to_string()))?;

            let updated = self.conn.execute(
                "UPDATE items SET path = ?1, name = ?2, kind = ?3, parent_id = ?4, metadata = ?5 WHERE id = ?6",
                params![
                    item.path,
                    item.name,
                    item.kind.as_str(),
                    item.parent_id.map(|p| p as i64),
                    metadata_json,
                    id as i64,
                ],
            );

            match updated {
                Ok(_) => Ok(item),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StorageError::DuplicatePath(item.path))
                }
                Err(e) => Err(StorageError::Sqlite(e)),
            }
        })();

        if owns_transaction {
            if result.is_ok() {
                self.conn.execute_batch("COMMIT;")?;
            } else {
                self.conn.execute_batch("ROLLBACK;")?;
            }
        }

        result
    }

    fn delete_item(&mut self, id: ItemId) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM items WHERE id = ?1", params![id as i64])?;
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, name, kind, parent_id, metadata FROM items WHERE id = ?1")?;
        Ok(stmt
            .query_row(params![id as i64], Self::row_to_item)
            .optional()?)
    }

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, name, kind, parent_id, metadata FROM items WHERE path = ?1",
        )?;
        Ok(stmt
            .query_row(params![path], Self::row_to_item)
            .optional()?)
    }

    fn all_items(&self) -> Result<Vec<Item>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, name, kind, parent_id, metadata FROM items")?;
        let rows = stmt.query_map([], Self::row_to_item)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn add_trigrams(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO trigrams (trigram, item_id, position) VALUES (?1, ?2, ?3)",
        )?;
        for (trigram, item_id, position) in postings {
            stmt.execute(params![trigram, *item_id as i64, *position as i64])?;
        }
        Ok(())
    }

    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM trigrams WHERE item_id = ?1",
            params![item_id as i64],
        )?;
        Ok(())
    }

    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>, StorageError> {
        search_counted(&self.conn, "trigrams", "trigram", trigrams)
    }

    fn add_tokens(&mut self, postings: &[(String, ItemId, u32)]) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO tokens (token, item_id, position) VALUES (?1, ?2, ?3)")?;
        for (token, item_id, position) in postings {
            stmt.execute(params![token, *item_id as i64, *position as i64])?;
        }
        Ok(())
    }

    fn remove_tokens(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM tokens WHERE item_id = ?1",
            params![item_id as i64],
        )?;
        Ok(())
    }

    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>, StorageError> {
        search_counted(&self.conn, "tokens", "token", tokens)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.in_transaction {
            tracing::warn!("nested begin() on SqliteStore is a no-op");
            return Ok(());
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT;")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK;")?;
        self.in_transaction = false;
        Ok(())
    }

    fn stats(&self) -> Result<Stats, StorageError> {
        let items: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))?;
        let distinct_trigrams: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT trigram) FROM trigrams",
            [],
            |r| r.get(0),
        )?;
        let distinct_tokens: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT token) FROM tokens", [], |r| r.get(0))?;

        Ok(Stats {
            items: items as u64,
            distinct_trigrams: distinct_trigrams as u64,
            distinct_tokens: distinct_tokens as u64,
            updated_at: UNIX_EPOCH + std::time::Duration::from_secs(Self::now_secs()),
        })
    }

    /// Force a WAL checkpoint; called periodically by the façade so the
    /// main database file doesn't fall arbitrarily far behind the log.
    fn checkpoint(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

fn search_counted(
    conn: &Connection,
    table: &str,
    column: &str,
    terms: &[String],
) -> Result<HashMap<ItemId, u32>, StorageError> {
    let terms = dedup_terms(terms);
    if terms.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = terms.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT item_id, COUNT(DISTINCT {column}) FROM {table} WHERE {column} IN ({placeholders}) GROUP BY item_id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(terms.iter()), |row| {
        let item_id: i64 = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((item_id as u64, count as u32))
    })?;

    let mut out = HashMap::new();
    for row in rows {
        let (item_id, count) = row?;
        out.insert(item_id, count);
    }
    Ok(out)
}
