//! Core domain logic for NodeTree.
//! This crate is the single source of truth for tree invariants.

pub mod logging;
pub mod model;
pub mod service;
pub mod state;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{Node, NodeHandle, NodeTree, NodeTreeError};
pub use model::node_id::{generate_node_id, NodeId};
pub use service::tree_manager::{TreeManager, TreeManagerError};
pub use state::{TreeState, DEFAULT_ROOT_NAME, PLACEHOLDER_ROOT_ID};
pub use store::{
    decode_tree, encode_tree, open_store, open_store_in_memory, CodecError, KeyValueStore,
    MemoryKeyValueStore, SqliteKeyValueStore, StoreError, StoreResult, STORE_NAMESPACE,
    TREE_STORE_KEY,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
