//! Flutter-facing bindings for NodeTree core.
//!
//! # Responsibility
//! - Host the FRB-exported API surface.
//! - Keep all business rules inside `nodetree_core`.

pub mod api;
