//! Error kinds for the storage adapter and the engine built on top of it
//! (spec.md §7).

use thiserror::Error;

/// Errors raised by an `IndexStore` implementation.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no such item or path")]
    NotFound,

    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unexpected schema shape: {0}")]
    Schema(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Errors raised by the builder/façade layer.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("build cancelled")]
    Cancelled,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glob pattern error: {0}")]
    Glob(#[from] globset::Error),
}
