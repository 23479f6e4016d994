//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose tree navigation and mutation to Dart via FRB.
//! - Flatten tree snapshots into plain view records.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One tree manager per process, opened lazily on first use.
//! - Node handles cross the boundary as opaque `u64` values.

use log::warn;
use nodetree_core::{
    core_version as core_version_inner, default_log_level, init_logging as init_logging_inner,
    open_store,
    ping as ping_inner, Node, NodeHandle, TreeManager, TreeState, STORE_NAMESPACE,
};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

const TREE_DB_PATH_ENV: &str = "NODETREE_DB_PATH";
static TREE_DB_PATH: OnceCell<PathBuf> = OnceCell::new();
static TREE_MANAGER: OnceCell<TreeManager> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive);
///   blank selects the build's default level.
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let level = match level.trim() {
        "" => default_log_level(),
        explicit => explicit,
    };
    match init_logging_inner(level, log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One node as shown in lists and breadcrumbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Opaque handle to pass back into tree calls.
    pub handle: u64,
    /// Content-hash node id.
    pub id: String,
    /// User-facing label.
    pub name: String,
    /// Number of direct children.
    pub child_count: u32,
}

/// Flat projection of one tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeView {
    /// Displayed node.
    pub current: NodeView,
    /// Children of the displayed node in display order.
    pub children: Vec<NodeView>,
    /// Root down to the displayed node.
    pub path: Vec<NodeView>,
    /// Whether an up-navigation is available.
    pub can_navigate_up: bool,
    /// Whether the add-node input is open.
    pub is_adding_node: bool,
    /// Whether the persisted tree has been loaded.
    pub is_loaded: bool,
}

/// Action response envelope for tree mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeActionResponse {
    /// Whether the action changed state.
    pub ok: bool,
    /// Handle of the created node, when one was created.
    pub node_handle: Option<u64>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl TreeActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            node_handle: None,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            node_handle: None,
            message: message.into(),
        }
    }

    fn from_flag(changed: bool, success: &str, failure: &str) -> Self {
        if changed {
            Self::success(success)
        } else {
            Self::failure(failure)
        }
    }
}

/// Opens the process tree manager and schedules the initial load.
///
/// # FFI contract
/// - Sync call; opens the SQLite store on first call only.
/// - Load continues in background; poll `tree_state().is_loaded`.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_init() -> TreeActionResponse {
    match manager() {
        Ok(_) => TreeActionResponse::success("Tree ready."),
        Err(err) => TreeActionResponse::failure(err),
    }
}

/// Returns the current tree view.
///
/// Falls back to the placeholder view when the store cannot be opened.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_state() -> TreeView {
    match manager() {
        Ok(manager) => to_tree_view(&manager.state(), manager.is_loaded()),
        Err(_) => to_tree_view(&TreeState::placeholder(), false),
    }
}

/// Adds a node under the displayed node and closes the add-node input.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_add_node(name: String) -> TreeActionResponse {
    let manager = match manager() {
        Ok(manager) => manager,
        Err(err) => return TreeActionResponse::failure(err),
    };
    match manager.add_node(name.as_str()) {
        Ok(handle) => {
            manager.set_adding_node(false);
            TreeActionResponse {
                ok: true,
                node_handle: Some(handle.to_raw()),
                message: "Node added.".to_string(),
            }
        }
        Err(err) => TreeActionResponse::failure(format!("tree_add_node failed: {err}")),
    }
}

/// Removes a node with its subtree.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_remove_node(handle: u64) -> TreeActionResponse {
    with_manager(|manager| {
        TreeActionResponse::from_flag(
            manager.remove_node(NodeHandle::from_raw(handle)),
            "Node removed.",
            "Nothing removed.",
        )
    })
}

/// Renames a node in place.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_rename_node(handle: u64, name: String) -> TreeActionResponse {
    with_manager(
        |manager| match manager.rename_node(NodeHandle::from_raw(handle), name.as_str()) {
            Ok(()) => TreeActionResponse::success("Node renamed."),
            Err(err) => TreeActionResponse::failure(format!("tree_rename_node failed: {err}")),
        },
    )
}

/// Navigates to the displayed node's parent.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_navigate_up() -> TreeActionResponse {
    with_manager(|manager| {
        TreeActionResponse::from_flag(manager.navigate_up(), "Moved up.", "Already at root.")
    })
}

/// Navigates to a node of the active tree.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_navigate_to(handle: u64) -> TreeActionResponse {
    with_manager(|manager| {
        TreeActionResponse::from_flag(
            manager.navigate_to(NodeHandle::from_raw(handle)),
            "Navigated.",
            "Node not found.",
        )
    })
}

/// Opens or closes the add-node input.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_set_adding_node(is_adding: bool) -> TreeActionResponse {
    with_manager(|manager| {
        manager.set_adding_node(is_adding);
        TreeActionResponse::success("Flag updated.")
    })
}

/// Blocks until queued saves have reached the store.
///
/// Intended for app pause/exit hooks.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_flush() -> TreeActionResponse {
    with_manager(|manager| match manager.flush() {
        Ok(()) => TreeActionResponse::success("Flushed."),
        Err(err) => TreeActionResponse::failure(format!("tree_flush failed: {err}")),
    })
}

fn resolve_tree_db_path() -> PathBuf {
    TREE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(TREE_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(format!("{STORE_NAMESPACE}.sqlite3"))
        })
        .clone()
}

fn manager() -> Result<&'static TreeManager, String> {
    TREE_MANAGER.get_or_try_init(|| {
        let path = resolve_tree_db_path();
        let store = open_store(&path).map_err(|err| {
            warn!("event=ffi_init module=ffi status=error error_code=store_open_failed error={err}");
            format!("tree store open failed: {err}")
        })?;
        TreeManager::open(store).map_err(|err| format!("tree manager start failed: {err}"))
    })
}

fn with_manager(f: impl FnOnce(&TreeManager) -> TreeActionResponse) -> TreeActionResponse {
    match manager() {
        Ok(manager) => f(manager),
        Err(err) => TreeActionResponse::failure(err),
    }
}

fn to_tree_view(state: &TreeState, is_loaded: bool) -> TreeView {
    let current = state
        .current()
        .map(|node| to_node_view(state.current_node(), node))
        .unwrap_or_else(|| NodeView {
            handle: state.current_node().to_raw(),
            id: String::new(),
            name: String::new(),
            child_count: 0,
        });
    TreeView {
        current,
        children: state
            .current_children()
            .into_iter()
            .map(|(handle, node)| to_node_view(handle, node))
            .collect(),
        path: state
            .breadcrumbs()
            .into_iter()
            .map(|(handle, node)| to_node_view(handle, node))
            .collect(),
        can_navigate_up: state.can_navigate_up(),
        is_adding_node: state.is_adding_node(),
        is_loaded,
    }
}

fn to_node_view(handle: NodeHandle, node: &Node) -> NodeView {
    NodeView {
        handle: handle.to_raw(),
        id: node.id().to_string(),
        name: node.name().to_string(),
        child_count: u32::try_from(node.children().len()).unwrap_or(u32::MAX),
    }
}
