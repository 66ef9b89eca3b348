use cairn_types::{Node, ObjectHash};

use crate::canonical::canonicalize;
use crate::error::CanonResult;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"cairn-node-v1"`) that is
/// prepended to every hash computation, so bytes hashed for one purpose can
/// never collide with the same bytes hashed for another.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for node records.
    pub const NODE: Self = Self {
        domain: "cairn-node-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Canonicalize a node and hash the result.
    ///
    /// Returns the hash together with the canonical bytes it covers.
    pub fn hash_node(&self, node: &Node) -> CanonResult<(ObjectHash, Vec<u8>)> {
        let bytes = canonicalize(node)?;
        Ok((self.hash(&bytes), bytes))
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ObjectHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::NODE.hash(data), ContentHasher::NODE.hash(data));
    }

    #[test]
    fn custom_domain_changes_hash() {
        let hasher = ContentHasher::new("my-custom-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::NODE.hash(b"data"));
        assert_eq!(hasher.domain(), "my-custom-domain-v1");
    }

    #[test]
    fn domain_hash_differs_from_raw_hash() {
        assert_ne!(ContentHasher::NODE.hash(b"test"), ObjectHash::from_bytes(b"test"));
    }

    #[test]
    fn verify_correct_and_tampered_data() {
        let hash = ContentHasher::NODE.hash(b"original");
        assert!(ContentHasher::NODE.verify(b"original", &hash));
        assert!(!ContentHasher::NODE.verify(b"tampered", &hash));
    }

    #[test]
    fn identical_nodes_share_a_hash() {
        let a = Node::new().with("category", "Ducts").with("diameter", 200i64);
        let b = Node::new().with("diameter", 200i64).with("category", "Ducts");
        let (ha, bytes_a) = ContentHasher::NODE.hash_node(&a).unwrap();
        let (hb, bytes_b) = ContentHasher::NODE.hash_node(&b).unwrap();
        assert_eq!(ha, hb);
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn transient_properties_do_not_affect_hash() {
        let plain = Node::new().with("name", "Level 1");
        let mut annotated = plain.clone();
        annotated.set_transient("element_id", 1234i64);
        let (h1, _) = ContentHasher::NODE.hash_node(&plain).unwrap();
        let (h2, _) = ContentHasher::NODE.hash_node(&annotated).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_references_produce_different_hashes() {
        let a = Node::new().with("child", ObjectHash::from_bytes(b"v1"));
        let b = Node::new().with("child", ObjectHash::from_bytes(b"v2"));
        let (ha, _) = ContentHasher::NODE.hash_node(&a).unwrap();
        let (hb, _) = ContentHasher::NODE.hash_node(&b).unwrap();
        assert_ne!(ha, hb);
    }
}
