//! Node identification and hashing.
//!
//! [`NodeHash`] converts the node ID Envoy presents in its bootstrap into
//! a fixed-size key for cache lookups, using FNV-1a hashing.

use std::fmt;
use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

/// Hash-based node identifier for efficient lookup.
///
/// A wildcard value exists for streams whose first request carries no
/// node identity.
///
/// # Example
///
/// ```rust
/// use kage_cache::NodeHash;
///
/// let node1 = NodeHash::from_id("kage-ns1-nginx");
/// let node2 = NodeHash::from_id("kage-ns1-httpd");
/// let wildcard = NodeHash::wildcard();
///
/// assert_ne!(node1, node2);
/// assert!(wildcard.is_wildcard());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHash {
    hash: u64,
    is_wildcard: bool,
}

impl NodeHash {
    const WILDCARD_HASH: u64 = 0;

    /// Create a node hash from a node ID string.
    #[must_use]
    pub fn from_id(node_id: &str) -> Self {
        let mut hasher = FnvHasher::default();
        node_id.hash(&mut hasher);
        let hash = hasher.finish();

        // Ensure we don't accidentally create a wildcard
        let hash = if hash == Self::WILDCARD_HASH {
            hash.wrapping_add(1)
        } else {
            hash
        };

        Self {
            hash,
            is_wildcard: false,
        }
    }

    /// Create a wildcard node hash that matches all nodes.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            hash: Self::WILDCARD_HASH,
            is_wildcard: true,
        }
    }

    /// Check if this is a wildcard hash.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }

    /// Get the raw hash value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.hash
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard {
            write!(f, "<wildcard>")
        } else {
            write!(f, "{:016x}", self.hash)
        }
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        Self::wildcard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_hash_deterministic() {
        let node1 = NodeHash::from_id("kage-ns1-nginx");
        let node2 = NodeHash::from_id("kage-ns1-nginx");
        assert_eq!(node1, node2);
        assert_eq!(node1.as_u64(), node2.as_u64());
    }

    #[test]
    fn test_node_hash_distinct_ids() {
        let node1 = NodeHash::from_id("kage-ns1-nginx");
        let node2 = NodeHash::from_id("kage-ns2-nginx");
        assert_ne!(node1, node2);
    }

    #[test]
    fn test_wildcard() {
        let wildcard = NodeHash::wildcard();
        assert!(wildcard.is_wildcard());
        assert!(!NodeHash::from_id("n1").is_wildcard());
        assert_eq!(NodeHash::default(), wildcard);
    }
}
