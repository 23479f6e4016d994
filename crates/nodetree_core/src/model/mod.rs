//! Tree domain model.
//!
//! # Responsibility
//! - Define the node entity and the arena that owns it.
//! - Derive content-hash node identifiers.
//!
//! # Invariants
//! - Nodes are addressed by generational handles, never by raw references.
//! - Node ids are content-derived and may collide; handles never do.

pub mod node;
pub mod node_id;
