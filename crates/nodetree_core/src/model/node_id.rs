//! Content-derived node identifiers.
//!
//! # Responsibility
//! - Derive a stable identifier from a node name.
//!
//! # Invariants
//! - Same name always yields the same id, across calls and processes.
//! - Ids are 40 lowercase hex characters (last 20 bytes of SHA-256).
//! - Ids are not unique: equal names collide by construction.

use sha2::{Digest, Sha256};

/// Stable node identifier in lowercase hex form.
pub type NodeId = String;

/// Number of trailing digest bytes kept in a node id.
pub const NODE_ID_BYTES: usize = 20;

/// Generates the content-hash id for `name`.
///
/// Hashes the UTF-8 bytes of `name` with SHA-256 and keeps the last
/// [`NODE_ID_BYTES`] bytes of the digest.
pub fn generate_node_id(name: &str) -> NodeId {
    let digest = Sha256::digest(name.as_bytes());
    hex::encode(&digest[digest.len() - NODE_ID_BYTES..])
}

#[cfg(test)]
mod tests {
    use super::{generate_node_id, NODE_ID_BYTES};

    #[test]
    fn id_is_deterministic() {
        assert_eq!(generate_node_id("Docs"), generate_node_id("Docs"));
        assert_ne!(generate_node_id("Docs"), generate_node_id("docs"));
    }

    #[test]
    fn id_keeps_trailing_digest_bytes_as_lowercase_hex() {
        // sha256("") = e3b0c44298fc1c149afbf4c8 | 996fb92427ae41e4649b934ca495991b7852b855
        assert_eq!(
            generate_node_id(""),
            "996fb92427ae41e4649b934ca495991b7852b855"
        );
        let id = generate_node_id("Root");
        assert_eq!(id.len(), NODE_ID_BYTES * 2);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn id_hashes_utf8_bytes() {
        let id = generate_node_id("Заметки");
        assert_eq!(id.len(), NODE_ID_BYTES * 2);
        assert_eq!(id, generate_node_id("Заметки"));
    }
}
