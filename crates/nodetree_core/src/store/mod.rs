//! Persistence adapter for the node tree.
//!
//! # Responsibility
//! - Define the key-value store contract the tree is persisted through.
//! - Provide SQLite-backed and in-memory store implementations.
//! - Encode/decode the tree blob and run the single-writer worker.
//!
//! # Invariants
//! - The whole tree lives under one key as one JSON document.
//! - Only the persistence worker touches a store after manager startup.

pub mod codec;
mod memory;
pub mod sqlite;
pub(crate) mod worker;

pub use codec::{decode_tree, encode_tree, CodecError};
pub use memory::MemoryKeyValueStore;
pub use sqlite::{open_store, open_store_in_memory, SqliteKeyValueStore};

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key under which the serialized tree is stored.
pub const TREE_STORE_KEY: &str = "tree";

/// Store namespace; also the default database file stem.
pub const STORE_NAMESPACE: &str = "node_tree_prefs";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from key-value store backends.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// Database was written by a newer schema than this binary supports.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Non-SQLite backend failure.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Backend(message) => write!(f, "store backend failure: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::Backend(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// String key-value store the tree blob is persisted in.
///
/// Implementations are moved onto the persistence worker thread, hence
/// `Send`.
pub trait KeyValueStore: Send {
    /// Reads the value under `key`. Absent keys are `Ok(None)`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    /// Writes `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: &str) -> StoreResult<()>;
    /// Deletes `key`. Absent keys are not an error.
    fn remove(&mut self, key: &str) -> StoreResult<()>;
}
