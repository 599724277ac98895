//! Consistent-hash ring with virtual nodes.
//!
//! Maps arbitrary keys onto a fixed set of physical nodes such that
//! adding a node remaps only a fraction of the key space. Each physical
//! node occupies multiple virtual positions on a signed 32-bit modular
//! ring to smooth load distribution.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::hash::HashFn;
use crate::DEFAULT_VNODE_REPLICAS;

/// Separator between a node id and its virtual-node index.
const VNODE_SEPARATOR: &str = "&&VN";

/// A consistent-hash ring mapping keys to physical nodes.
///
/// The ring follows a build-then-freeze pattern: populate it fully with
/// [`add_node`](HashRing::add_node) before exposing it to lookup
/// callers. Mutating the ring concurrently with lookups is out of
/// contract; once populated it is safe to share read-only across
/// threads. There is no node removal.
pub struct HashRing {
    replicas: usize,
    hasher: Arc<dyn HashFn>,
    ring: BTreeMap<i32, String>,
}

impl HashRing {
    /// Creates an empty ring with `replicas` virtual nodes per physical
    /// node.
    ///
    /// Fails with [`CoreError::InvalidReplicas`] when `replicas` is
    /// zero.
    pub fn new(replicas: usize, hasher: Arc<dyn HashFn>) -> Result<Self, CoreError> {
        if replicas == 0 {
            return Err(CoreError::InvalidReplicas);
        }
        Ok(Self {
            replicas,
            hasher,
            ring: BTreeMap::new(),
        })
    }

    /// Creates an empty ring with [`DEFAULT_VNODE_REPLICAS`] virtual
    /// nodes per physical node.
    pub fn with_default_replicas(hasher: Arc<dyn HashFn>) -> Self {
        Self {
            replicas: DEFAULT_VNODE_REPLICAS,
            hasher,
            ring: BTreeMap::new(),
        }
    }

    /// Adds a physical node, inserting one ring position per virtual
    /// node at `hash(node_id + "&&VN" + index)`.
    ///
    /// A position collision between virtual nodes is overwritten
    /// silently (last writer wins); with the digest folders such
    /// collisions are improbable.
    pub fn add_node(&mut self, node_id: &str) -> &mut Self {
        for vnode in 0..self.replicas {
            let position = self
                .hasher
                .fold(&format!("{node_id}{VNODE_SEPARATOR}{vnode}"));
            self.ring.insert(position, node_id.to_string());
        }
        self
    }

    /// Maps a key to its owning node.
    ///
    /// Finds the smallest ring position at or after the key's hash; when
    /// the hash is past every position, wraps around to the smallest
    /// position on the ring. Deterministic for an unchanged ring.
    ///
    /// Fails with [`CoreError::EmptyRing`] when no nodes were added.
    pub fn get_node(&self, key: &str) -> Result<&str, CoreError> {
        let hash = self.hasher.fold(key);
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node_id)| node_id.as_str())
            .ok_or(CoreError::EmptyRing)
    }

    /// Number of virtual-node positions on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns true when no nodes were added.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Distinct physical nodes on the ring, sorted.
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.ring.values().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Configured virtual nodes per physical node.
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{DigestAlgorithm, DigestFolder};

    /// Hasher with hand-picked positions, for exact topology tests.
    struct FixedHash;

    impl HashFn for FixedHash {
        fn fold(&self, key: &str) -> i32 {
            match key {
                "n1&&VN0" => 10,
                "n2&&VN0" => 20,
                "n3&&VN0" => -5,
                "low" => -30,
                "mid" => 15,
                "high" => 25,
                "exact" => 20,
                _ => 0,
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn digest_ring(replicas: usize) -> HashRing {
        let hasher = Arc::new(DigestFolder::new(DigestAlgorithm::Md5));
        HashRing::new(replicas, hasher).unwrap()
    }

    #[test]
    fn test_empty_ring_fails() {
        let ring = digest_ring(100);
        assert!(matches!(ring.get_node("user:42"), Err(CoreError::EmptyRing)));
    }

    #[test]
    fn test_zero_replicas_rejected() {
        let hasher = Arc::new(DigestFolder::new(DigestAlgorithm::Md5));
        assert!(matches!(
            HashRing::new(0, hasher),
            Err(CoreError::InvalidReplicas)
        ));
    }

    #[test]
    fn test_lookup_deterministic() {
        let mut ring = digest_ring(100);
        ring.add_node("A").add_node("B").add_node("C");

        let first = ring.get_node("user:42").unwrap().to_string();
        for _ in 0..1000 {
            assert_eq!(ring.get_node("user:42").unwrap(), first);
        }
        assert!(["A", "B", "C"].contains(&first.as_str()));
    }

    #[test]
    fn test_tail_lookup_and_wraparound() {
        let mut ring = HashRing::new(1, Arc::new(FixedHash)).unwrap();
        ring.add_node("n1").add_node("n2");

        // 15 falls between positions 10 and 20: owned by n2.
        assert_eq!(ring.get_node("mid").unwrap(), "n2");
        // 20 lands exactly on n2's position.
        assert_eq!(ring.get_node("exact").unwrap(), "n2");
        // 25 is past every position: wraps to the smallest, n1 at 10.
        assert_eq!(ring.get_node("high").unwrap(), "n1");
        // -30 precedes every position: owned by n1 at 10.
        assert_eq!(ring.get_node("low").unwrap(), "n1");
    }

    #[test]
    fn test_negative_positions() {
        let mut ring = HashRing::new(1, Arc::new(FixedHash)).unwrap();
        ring.add_node("n1").add_node("n3");

        // -30 is below n3's position of -5.
        assert_eq!(ring.get_node("low").unwrap(), "n3");
    }

    #[test]
    fn test_all_nodes_reachable() {
        let mut ring = digest_ring(100);
        ring.add_node("A").add_node("B").add_node("C");

        let mut hit = std::collections::HashSet::new();
        for i in 0..1000 {
            hit.insert(ring.get_node(&format!("key-{i}")).unwrap().to_string());
        }
        assert_eq!(hit.len(), 3);
    }

    #[test]
    fn test_position_collision_last_writer_wins() {
        struct Collide;
        impl HashFn for Collide {
            fn fold(&self, _key: &str) -> i32 {
                7
            }
            fn name(&self) -> &'static str {
                "collide"
            }
        }

        let mut ring = HashRing::new(1, Arc::new(Collide)).unwrap();
        ring.add_node("first").add_node("second");

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.get_node("anything").unwrap(), "second");
    }

    #[test]
    fn test_introspection() {
        let mut ring = digest_ring(100);
        assert!(ring.is_empty());

        ring.add_node("B").add_node("A");
        assert_eq!(ring.len(), 200);
        assert_eq!(ring.nodes(), ["A", "B"]);
        assert_eq!(ring.replicas(), 100);
    }
}
