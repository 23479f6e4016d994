//! Tree manager use-case service.
//!
//! # Responsibility
//! - Own the single live [`TreeState`] and every transition on it.
//! - Publish each new snapshot to subscribers.
//! - Hand snapshots to the persistence worker after tree mutations.
//!
//! # Invariants
//! - All transitions run under one lock; snapshots are replaced wholesale.
//! - Handles passed in are re-resolved against the active tree before use.
//! - Handles issued before the load never resolve after it.
//! - No save is enqueued before the persisted tree has been loaded.
//! - Save and load failures are logged, never returned to callers.

use crate::model::node::{NodeHandle, NodeTree, NodeTreeError};
use crate::model::node_id::generate_node_id;
use crate::state::{TreeState, DEFAULT_ROOT_NAME};
use crate::store::worker::{LoadOutcome, PersistCommand, PersistenceWorker};
use crate::store::{KeyValueStore, TREE_STORE_KEY};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Errors from tree manager operations.
#[derive(Debug)]
pub enum TreeManagerError {
    /// Node name is blank after trim.
    InvalidNodeName,
    /// Handle does not resolve to a node of the active tree.
    NodeNotFound(NodeHandle),
    /// Structural tree failure.
    Tree(NodeTreeError),
    /// Persistence worker could not be started.
    WorkerSpawn(std::io::Error),
    /// Persistence worker has stopped.
    WorkerUnavailable,
}

impl Display for TreeManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNodeName => write!(f, "node name must not be blank"),
            Self::NodeNotFound(handle) => write!(f, "node not found in active tree: {handle}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::WorkerSpawn(err) => write!(f, "failed to start persistence worker: {err}"),
            Self::WorkerUnavailable => write!(f, "persistence worker is not running"),
        }
    }
}

impl Error for TreeManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::WorkerSpawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeTreeError> for TreeManagerError {
    fn from(value: NodeTreeError) -> Self {
        Self::Tree(value)
    }
}

struct Shared {
    state: TreeState,
    loaded: bool,
    subscribers: Vec<Sender<TreeState>>,
}

impl Shared {
    fn publish(&mut self) {
        let state = &self.state;
        self.subscribers
            .retain(|subscriber| subscriber.send(state.clone()).is_ok());
    }
}

/// Sole mutator of the tree state.
///
/// Dropping the manager drains queued saves and stops the worker.
pub struct TreeManager {
    shared: Arc<Mutex<Shared>>,
    worker: PersistenceWorker,
}

impl TreeManager {
    /// Starts a manager over `store` and schedules the initial load.
    ///
    /// The returned manager shows the placeholder root until the load
    /// finishes on the persistence worker.
    pub fn open<S>(store: S) -> Result<Self, TreeManagerError>
    where
        S: KeyValueStore + 'static,
    {
        let worker =
            PersistenceWorker::spawn(store, TREE_STORE_KEY).map_err(TreeManagerError::WorkerSpawn)?;
        let manager = Self {
            shared: Arc::new(Mutex::new(Shared {
                state: TreeState::placeholder(),
                loaded: false,
                subscribers: Vec::new(),
            })),
            worker,
        };
        manager.load_tree()?;
        Ok(manager)
    }

    /// Opens a manager and blocks until the initial load has been applied.
    pub fn open_blocking<S>(store: S) -> Result<Self, TreeManagerError>
    where
        S: KeyValueStore + 'static,
    {
        let manager = Self::open(store)?;
        manager.flush()?;
        Ok(manager)
    }

    /// Schedules reading the persisted tree. Runs once, from [`Self::open`].
    ///
    /// Absent or unreadable data yields a fresh `"Root"` node. The result
    /// replaces the current snapshot and is published.
    fn load_tree(&self) -> Result<(), TreeManagerError> {
        let shared = Arc::clone(&self.shared);
        self.worker
            .submit(PersistCommand::Load(Box::new(move |outcome| {
                apply_load(&shared, outcome);
            })))
            .map_err(|_| TreeManagerError::WorkerUnavailable)
    }

    /// Enqueues a save of the authoritative root.
    ///
    /// Never blocks on I/O and publishes nothing. Skipped before load.
    pub fn save_tree(&self) {
        let shared = self.lock();
        self.enqueue_save(&shared);
    }

    /// Returns the current snapshot.
    pub fn state(&self) -> TreeState {
        self.lock().state.clone()
    }

    /// Whether the persisted tree has replaced the placeholder.
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Subscribes to snapshots; the current one is delivered immediately.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<TreeState> {
        let (sender, receiver) = mpsc::channel();
        let mut shared = self.lock();
        if sender.send(shared.state.clone()).is_ok() {
            shared.subscribers.push(sender);
        }
        receiver
    }

    /// Blocks until every queued load/save has been applied.
    pub fn flush(&self) -> Result<(), TreeManagerError> {
        self.worker
            .flush()
            .map_err(|_| TreeManagerError::WorkerUnavailable)
    }

    /// Number of saves that reached the store, and that failed.
    pub fn save_counts(&self) -> (u64, u64) {
        let stats = self.worker.stats();
        (stats.saves_ok(), stats.saves_failed())
    }

    /// Adds a child named `name` under the displayed node.
    ///
    /// # Errors
    /// - [`TreeManagerError::InvalidNodeName`] when `name` is blank.
    pub fn add_node(&self, name: &str) -> Result<NodeHandle, TreeManagerError> {
        let name = normalize_node_name(name)?;
        let mut shared = self.lock();
        let parent = shared.state.current_node;
        let tree = Arc::make_mut(&mut shared.state.tree);
        let child = tree.insert(generate_node_id(name), name);
        tree.add_child(parent, child)?;
        let depth = tree.depth(child).unwrap_or_default();
        let siblings = tree.get(parent).map_or(0, |node| node.children().len());

        info!(
            "event=tree_add module=tree_manager status=ok depth={depth} siblings={siblings} nodes={}",
            shared.state.tree.len()
        );
        self.enqueue_save(&shared);
        shared.publish();
        Ok(child)
    }

    /// Removes `node` and its subtree from the active tree.
    ///
    /// When the displayed node is removed (directly or as a descendant), the
    /// view moves to the removed node's former parent. Removing the
    /// parentless root keeps the tree and moves the view to the root.
    /// Returns whether anything was removed; unknown handles are a no-op.
    pub fn remove_node(&self, node: NodeHandle) -> bool {
        let mut shared = self.lock();
        let root = shared.state.resolved_root();
        if !in_active_tree(&shared.state.tree, root, node) {
            debug!("event=tree_remove module=tree_manager status=skipped reason=not_found");
            return false;
        }

        let Some(parent) = shared.state.tree.get(node).and_then(|record| record.parent()) else {
            warn!("event=tree_remove module=tree_manager status=skipped reason=root_node");
            if shared.state.current_node != root {
                shared.state.current_node = root;
                shared.publish();
            }
            return false;
        };

        let current = shared.state.current_node;
        let view_removed = shared.state.tree.is_ancestor(node, current);
        let removed = Arc::make_mut(&mut shared.state.tree).free_subtree(node);
        if view_removed {
            shared.state.current_node = parent;
        }

        info!(
            "event=tree_remove module=tree_manager status=ok removed={removed} view_moved={view_removed} nodes={}",
            shared.state.tree.len()
        );
        self.enqueue_save(&shared);
        shared.publish();
        true
    }

    /// Renames `node` in place; its id is unchanged.
    pub fn rename_node(&self, node: NodeHandle, name: &str) -> Result<(), TreeManagerError> {
        let name = normalize_node_name(name)?;
        let mut shared = self.lock();
        let root = shared.state.resolved_root();
        if !in_active_tree(&shared.state.tree, root, node) {
            return Err(TreeManagerError::NodeNotFound(node));
        }
        Arc::make_mut(&mut shared.state.tree).rename(node, name)?;

        info!("event=tree_rename module=tree_manager status=ok");
        self.enqueue_save(&shared);
        shared.publish();
        Ok(())
    }

    /// Moves the view to the displayed node's parent, if any.
    pub fn navigate_up(&self) -> bool {
        let mut shared = self.lock();
        let Some(parent) = shared.state.current().and_then(|node| node.parent()) else {
            return false;
        };
        shared.state.current_node = parent;
        shared.publish();
        true
    }

    /// Moves the view to `node` after re-resolving it in the active tree.
    ///
    /// Stale or foreign handles leave the state unchanged.
    pub fn navigate_to(&self, node: NodeHandle) -> bool {
        let mut shared = self.lock();
        let root = shared.state.resolved_root();
        if !in_active_tree(&shared.state.tree, root, node) {
            debug!("event=tree_navigate module=tree_manager status=skipped reason=not_found");
            return false;
        }
        shared.state.current_node = node;
        shared.publish();
        true
    }

    /// Sets the add-node UI flag.
    pub fn set_adding_node(&self, is_adding: bool) {
        let mut shared = self.lock();
        if shared.state.is_adding_node == is_adding {
            return;
        }
        shared.state.is_adding_node = is_adding;
        shared.publish();
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    fn enqueue_save(&self, shared: &Shared) {
        if !shared.loaded {
            debug!("event=tree_save module=tree_manager status=skipped reason=not_loaded");
            return;
        }
        let command = PersistCommand::Save {
            tree: Arc::clone(&shared.state.tree),
            root: shared.state.resolved_root(),
        };
        if self.worker.submit(command).is_err() {
            warn!("event=tree_save module=tree_manager status=error error_code=worker_unavailable");
        }
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_load(shared: &Mutex<Shared>, outcome: LoadOutcome) {
    let mut shared = lock_shared(shared);
    // The loaded tree moves into the live arena so every handle issued
    // against the placeholder goes stale instead of aliasing a loaded node.
    let mut tree = std::mem::take(&mut shared.state.tree);
    let arena = Arc::make_mut(&mut tree);
    arena.clear();
    let (root, source) = match &outcome {
        LoadOutcome::Loaded(loaded, loaded_root) => match arena.graft(loaded, *loaded_root) {
            Some(root) => (root, "store"),
            None => (insert_default_root(arena), "fallback_malformed"),
        },
        LoadOutcome::Missing => (insert_default_root(arena), "fresh"),
        LoadOutcome::Malformed(_) => (insert_default_root(arena), "fallback_malformed"),
        LoadOutcome::Failed(_) => (insert_default_root(arena), "fallback_read_error"),
    };

    let is_adding_node = shared.state.is_adding_node;
    shared.state = TreeState::with_root(tree, root);
    shared.state.is_adding_node = is_adding_node;
    shared.loaded = true;
    info!(
        "event=tree_ready module=tree_manager status=ok source={source} nodes={}",
        shared.state.tree.len()
    );
    shared.publish();
}

fn insert_default_root(tree: &mut NodeTree) -> NodeHandle {
    tree.insert(generate_node_id(DEFAULT_ROOT_NAME), DEFAULT_ROOT_NAME)
}

fn in_active_tree(tree: &NodeTree, root: NodeHandle, node: NodeHandle) -> bool {
    tree.contains(node) && tree.is_ancestor(root, node)
}

fn normalize_node_name(value: &str) -> Result<&str, TreeManagerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeManagerError::InvalidNodeName);
    }
    Ok(trimmed)
}
