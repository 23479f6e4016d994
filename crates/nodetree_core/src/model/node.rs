//! Node entity and arena-backed tree storage.
//!
//! # Responsibility
//! - Own every node of one or more trees in a single arena.
//! - Keep parent/children links bidirectionally consistent.
//!
//! # Invariants
//! - `child.parent == Some(p)` iff `p.children` contains `child` exactly once.
//! - Parent links never form a cycle; walking upward always reaches a root.
//! - Freed slots bump their generation, so stale handles never resolve.

use crate::model::node_id::NodeId;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Generational handle of one node inside a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    /// Packs the handle into one integer for transport across FFI.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Unpacks a handle produced by [`NodeHandle::to_raw`].
    ///
    /// The result is not validated; lookups on a [`NodeTree`] do that.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl Display for NodeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Errors from structural tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTreeError {
    /// Handle does not resolve to a live node.
    StaleHandle(NodeHandle),
    /// Attaching a node under itself.
    SelfParent(NodeHandle),
    /// Attaching `child` under `parent` would make `child` its own ancestor.
    CycleDetected {
        parent: NodeHandle,
        child: NodeHandle,
    },
}

impl Display for NodeTreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleHandle(handle) => write!(f, "node handle is not live: {handle}"),
            Self::SelfParent(handle) => write!(f, "node cannot be its own parent: {handle}"),
            Self::CycleDetected { parent, child } => write!(
                f,
                "attaching node {child} under {parent} would create a cycle"
            ),
        }
    }
}

impl Error for NodeTreeError {}

/// Tree node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    name: String,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

impl Node {
    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// User-facing label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-owning back-reference. `None` for a root or a detached node.
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Owned children in display order.
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena owning tree nodes.
///
/// Nodes are created detached with [`NodeTree::insert`] and linked with
/// [`NodeTree::add_child`]. A single arena may hold several disjoint trees.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeTree {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no node is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Creates one detached node and returns its handle.
    pub fn insert(&mut self, id: impl Into<NodeId>, name: impl Into<String>) -> NodeHandle {
        let node = Node {
            id: id.into(),
            name: name.into(),
            parent: None,
            children: Vec::new(),
        };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    /// Resolves a handle to its node, if live.
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether `handle` resolves to a live node.
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    fn require(&self, handle: NodeHandle) -> Result<&Node, NodeTreeError> {
        self.get(handle).ok_or(NodeTreeError::StaleHandle(handle))
    }

    /// Appends `child` to `parent` and points `child` back at `parent`.
    ///
    /// A child attached elsewhere is detached from its old parent first.
    /// Names and ids are not checked for duplicates.
    ///
    /// # Errors
    /// - [`NodeTreeError::StaleHandle`] when either handle is not live.
    /// - [`NodeTreeError::SelfParent`] / [`NodeTreeError::CycleDetected`] when
    ///   the link would break the no-cycle invariant.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), NodeTreeError> {
        self.require(parent)?;
        let old_parent = self.require(child)?.parent;
        if parent == child {
            return Err(NodeTreeError::SelfParent(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(NodeTreeError::CycleDetected { parent, child });
        }

        if let Some(old_parent) = old_parent {
            self.remove_child(old_parent, child);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Detaches `child` from `parent`.
    ///
    /// Returns `false` and changes nothing when `child` is not a child of
    /// `parent` (including stale handles).
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        let Some(parent_node) = self.get_mut(parent) else {
            return false;
        };
        let Some(position) = parent_node.children.iter().position(|c| *c == child) else {
            return false;
        };
        parent_node.children.remove(position);
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = None;
        }
        true
    }

    /// Renames one node in place. Its id is left unchanged.
    pub fn rename(&mut self, handle: NodeHandle, name: impl Into<String>) -> Result<(), NodeTreeError> {
        let node = self
            .get_mut(handle)
            .ok_or(NodeTreeError::StaleHandle(handle))?;
        node.name = name.into();
        Ok(())
    }

    /// Walks parent links up to the parentless node.
    ///
    /// Returns `None` only for a stale handle.
    pub fn find_root(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let mut current = handle;
        let mut node = self.get(current)?;
        while let Some(parent) = node.parent {
            current = parent;
            node = self.get(current)?;
        }
        Some(current)
    }

    /// Number of parent links between `handle` and its root.
    pub fn depth(&self, handle: NodeHandle) -> Option<usize> {
        let mut depth = 0;
        let mut node = self.get(handle)?;
        while let Some(parent) = node.parent {
            depth += 1;
            node = self.get(parent)?;
        }
        Some(depth)
    }

    /// Handles from the root down to `handle`, both inclusive.
    pub fn path(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut path = Vec::new();
        let mut cursor = self.get(handle).map(|_| handle);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.get(current).and_then(Node::parent);
        }
        path.reverse();
        path
    }

    /// Whether `ancestor` is `handle` itself or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeHandle, handle: NodeHandle) -> bool {
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(Node::parent);
        }
        false
    }

    /// Pre-order handles of `handle` and all its descendants.
    pub fn descendants(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut order = Vec::new();
        if !self.contains(handle) {
            return order;
        }
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(node) = self.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Depth-first pre-order search of `from` and its descendants by `id`.
    ///
    /// Returns the first match. With colliding ids, earlier siblings win.
    pub fn find_node(&self, from: NodeHandle, id: &str) -> Option<NodeHandle> {
        self.descendants(from)
            .into_iter()
            .find(|handle| self.get(*handle).is_some_and(|node| node.id == id))
    }

    /// Copies the subtree rooted at `handle` into a new, independent arena.
    ///
    /// Parent links inside the copy point within the copy; the copied root
    /// has no parent. Returns `None` for a stale handle.
    pub fn deep_copy(&self, handle: NodeHandle) -> Option<(NodeTree, NodeHandle)> {
        let mut copy = NodeTree::new();
        let copy_root = copy.graft(self, handle)?;
        Some((copy, copy_root))
    }

    /// Copies the subtree of `source` rooted at `handle` into this arena as
    /// a new detached tree.
    ///
    /// Returns the handle of the copied root, or `None` for a stale handle.
    pub fn graft(&mut self, source: &NodeTree, handle: NodeHandle) -> Option<NodeHandle> {
        let source_root = source.get(handle)?;
        let copy_root = self.insert(source_root.id.clone(), source_root.name.clone());

        let mut queue = VecDeque::from([(handle, copy_root)]);
        while let Some((from, target)) = queue.pop_front() {
            let Some(node) = source.get(from) else {
                continue;
            };
            for child in &node.children {
                let Some(child_node) = source.get(*child) else {
                    continue;
                };
                let copied = self.insert(child_node.id.clone(), child_node.name.clone());
                self.link_unchecked(target, copied);
                queue.push_back((*child, copied));
            }
        }
        Some(copy_root)
    }

    /// Frees every live node. No handle issued before the call resolves
    /// afterwards, including ones for slots that get reused.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
    }

    /// Releases the slots of `handle` and all its descendants.
    ///
    /// The subtree is detached from its parent first. Returns the number of
    /// freed nodes.
    pub fn free_subtree(&mut self, handle: NodeHandle) -> usize {
        let Some(parent) = self.get(handle).map(Node::parent) else {
            return 0;
        };
        if let Some(parent) = parent {
            self.remove_child(parent, handle);
        }

        let doomed = self.descendants(handle);
        for doomed_handle in &doomed {
            let slot = &mut self.slots[doomed_handle.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(doomed_handle.index);
        }
        self.live -= doomed.len();
        doomed.len()
    }

    /// Links a freshly inserted detached `child` under `parent`.
    ///
    /// Callers guarantee both handles are live and `child` has no parent.
    pub(crate) fn link_unchecked(&mut self, parent: NodeHandle, child: NodeHandle) {
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }
}
