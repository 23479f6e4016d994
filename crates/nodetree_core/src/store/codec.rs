//! JSON codec for the persisted tree blob.
//!
//! # Responsibility
//! - Serialize a subtree as nested `{id, name, children}` objects.
//! - Rebuild a fresh arena with parent links from that document.
//!
//! # Invariants
//! - Parent links are never serialized; decode derives them.
//! - Child order in the document is display order.
//! - A missing or `null` `children` field decodes as no children.
//! - Nesting depth is unbounded; deep documents grow the stack on demand.

use crate::model::node::{NodeHandle, NodeTree};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Deserialize)]
struct SerializedNode {
    id: String,
    name: String,
    #[serde(default)]
    children: Option<Vec<SerializedNode>>,
}

/// Borrowed view of one live node, serialized as `{id, name, children}`.
struct NodeDocument<'a> {
    tree: &'a NodeTree,
    handle: NodeHandle,
}

impl Serialize for NodeDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self
            .tree
            .get(self.handle)
            .ok_or_else(|| {
                <S::Error as serde::ser::Error>::custom(CodecError::StaleRoot(self.handle))
            })?;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", node.id())?;
        map.serialize_entry("name", node.name())?;
        map.serialize_entry(
            "children",
            &ChildDocuments {
                tree: self.tree,
                children: node.children(),
            },
        )?;
        map.end()
    }
}

struct ChildDocuments<'a> {
    tree: &'a NodeTree,
    children: &'a [NodeHandle],
}

impl Serialize for ChildDocuments<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for child in self.children.iter().filter(|child| self.tree.contains(**child)) {
            seq.serialize_element(&NodeDocument {
                tree: self.tree,
                handle: *child,
            })?;
        }
        seq.end()
    }
}

/// Errors from tree blob encode/decode.
#[derive(Debug)]
pub enum CodecError {
    /// Blob is not a valid tree document.
    Json(serde_json::Error),
    /// Root handle to encode is not live.
    StaleRoot(NodeHandle),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed tree document: {err}"),
            Self::StaleRoot(handle) => write!(f, "tree root is not live: {handle}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::StaleRoot(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Serializes the subtree rooted at `root` to JSON text.
pub fn encode_tree(tree: &NodeTree, root: NodeHandle) -> Result<String, CodecError> {
    if !tree.contains(root) {
        return Err(CodecError::StaleRoot(root));
    }
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::new(&mut buffer);
    NodeDocument { tree, handle: root }.serialize(serde_stacker::Serializer::new(&mut serializer))?;
    String::from_utf8(buffer).map_err(|err| CodecError::Json(serde::ser::Error::custom(err)))
}

/// Parses JSON text into a new arena and returns it with the root handle.
pub fn decode_tree(text: &str) -> Result<(NodeTree, NodeHandle), CodecError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let document = SerializedNode::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;

    let mut tree = NodeTree::new();
    let root = tree.insert(document.id, document.name);
    let mut pending = vec![(root, document.children.unwrap_or_default())];
    while let Some((parent, children)) = pending.pop() {
        for SerializedNode { id, name, children } in children {
            let handle = tree.insert(id, name);
            tree.link_unchecked(parent, handle);
            pending.push((handle, children.unwrap_or_default()));
        }
    }
    Ok((tree, root))
}
