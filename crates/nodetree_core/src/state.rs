//! Immutable tree state snapshots.
//!
//! # Responsibility
//! - Bundle the tree, its root, the displayed node, and the add-mode flag.
//! - Offer read helpers for presentation layers.
//!
//! # Invariants
//! - A published snapshot never changes; transitions build a new one.
//! - `current_node` resolves to a live node in `tree`.

use crate::model::node::{Node, NodeHandle, NodeTree};
use std::sync::Arc;

/// Id of the placeholder root shown before load completes.
pub const PLACEHOLDER_ROOT_ID: &str = "";

/// Name of the default root node.
pub const DEFAULT_ROOT_NAME: &str = "Root";

/// One published snapshot of the tree manager state.
///
/// Cloning is cheap: the arena is shared behind an `Arc` and copied only
/// when the manager mutates a tree that a snapshot still references.
#[derive(Debug, Clone)]
pub struct TreeState {
    pub(crate) tree: Arc<NodeTree>,
    pub(crate) root_node: Option<NodeHandle>,
    pub(crate) current_node: NodeHandle,
    pub(crate) is_adding_node: bool,
}

impl TreeState {
    /// Snapshot holding only the placeholder root (`""`, `"Root"`).
    pub fn placeholder() -> Self {
        let mut tree = NodeTree::new();
        let current_node = tree.insert(PLACEHOLDER_ROOT_ID, DEFAULT_ROOT_NAME);
        Self {
            tree: Arc::new(tree),
            root_node: None,
            current_node,
            is_adding_node: false,
        }
    }

    pub(crate) fn with_root(tree: impl Into<Arc<NodeTree>>, root: NodeHandle) -> Self {
        Self {
            tree: tree.into(),
            root_node: Some(root),
            current_node: root,
            is_adding_node: false,
        }
    }

    /// Arena the handles of this snapshot point into.
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Tracked root, if one has been established.
    pub fn root_node(&self) -> Option<NodeHandle> {
        self.root_node
    }

    /// Tracked root, or the root found by walking up from `current_node`.
    pub fn resolved_root(&self) -> NodeHandle {
        self.root_node
            .or_else(|| self.tree.find_root(self.current_node))
            .unwrap_or(self.current_node)
    }

    /// Handle of the displayed node.
    pub fn current_node(&self) -> NodeHandle {
        self.current_node
    }

    /// Displayed node record.
    pub fn current(&self) -> Option<&Node> {
        self.tree.get(self.current_node)
    }

    /// Whether the add-node input is open.
    pub fn is_adding_node(&self) -> bool {
        self.is_adding_node
    }

    /// Children of the displayed node with their handles, in display order.
    pub fn current_children(&self) -> Vec<(NodeHandle, &Node)> {
        self.current()
            .map(|node| {
                node.children()
                    .iter()
                    .filter_map(|child| self.tree.get(*child).map(|record| (*child, record)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Path from the root down to the displayed node.
    pub fn breadcrumbs(&self) -> Vec<(NodeHandle, &Node)> {
        self.tree
            .path(self.current_node)
            .into_iter()
            .filter_map(|handle| self.tree.get(handle).map(|node| (handle, node)))
            .collect()
    }

    /// Whether `navigate_up` would move.
    pub fn can_navigate_up(&self) -> bool {
        self.current().and_then(Node::parent).is_some()
    }
}

impl Default for TreeState {
    fn default() -> Self {
        Self::placeholder()
    }
}
