//! # Key Distribution
//!
//! Purpose: Map routing keys to cluster nodes with a weighted consistent-hash
//! ring, so equal keys land on the same node and membership changes only move
//! the keys whose ring segment changed.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: `Distributor` is the seam; `HashRing` is the
//!    default implementation used by `ClusterConnection`.
//! 2. **Deterministic Ring**: Points are sorted by `(point, node)` so the
//!    ring does not depend on insertion order.
//! 3. **Weighted Replicas**: Each node gets `replicas * weight / 100` points,
//!    independent of the other members.
//!
//! ## Ring Layout
//!
//! ```text
//!   point = crc32("<node>:<i>")  for i in 0..replicas * weight / 100
//!
//!   0 ──●────●───●──────●────●──── u32::MAX
//!       a    b   a      c    b
//!   key hash h → first point >= h (wrapping to the first point)
//! ```

/// Replica points per node at the default weight.
pub const DEFAULT_REPLICAS: usize = 128;

/// Weight assumed for nodes that do not declare one.
pub const DEFAULT_WEIGHT: u32 = 100;

/// Returns the hashable part of a key.
///
/// When the key holds a non-empty `{tag}` (first `{`, then the next `}`),
/// only the tag is hashed; otherwise the whole key is.
pub fn extract_key_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(len) = key[open + 1..].iter().position(|&b| b == b'}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}

/// Strategy mapping hashed keys to node ids.
pub trait Distributor {
    /// Adds `node` with an optional weight (defaults to `DEFAULT_WEIGHT`).
    fn add(&mut self, node: &str, weight: Option<u32>);

    /// Removes `node`; returns false when it was not present.
    fn remove(&mut self, node: &str) -> bool;

    /// Hashes a routing key into ring space.
    fn hash(&self, key: &[u8]) -> u32;

    /// Returns the node owning `hash`, or `None` on an empty ring.
    fn get(&self, hash: u32) -> Option<&str>;

    fn is_empty(&self) -> bool;

    /// Convenience: `get(hash(key))`.
    fn node_for(&self, key: &[u8]) -> Option<&str> {
        self.get(self.hash(key))
    }
}

/// Weighted consistent-hash ring over CRC32 points.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    nodes: Vec<(String, u32)>,
    // (point, index into `nodes`), sorted by point then node id.
    ring: Vec<(u32, usize)>,
}

impl Default for HashRing {
    fn default() -> Self {
        HashRing::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    /// Creates an empty ring with `replicas` points per default-weight node.
    pub fn new(replicas: usize) -> Self {
        HashRing {
            replicas: replicas.max(1),
            nodes: Vec::new(),
            ring: Vec::new(),
        }
    }

    /// Node ids currently on the ring, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(node, _)| node.as_str())
    }

    // Depends on the node's own weight only, so other nodes keep their points.
    fn replicas_for(&self, weight: u32) -> usize {
        let scaled = self.replicas as u64 * weight as u64 / DEFAULT_WEIGHT as u64;
        usize::try_from(scaled).unwrap_or(usize::MAX)
    }

    fn rebuild(&mut self) {
        self.ring.clear();
        if self.nodes.is_empty() {
            return;
        }

        for (idx, (node, weight)) in self.nodes.iter().enumerate() {
            for replica in 0..self.replicas_for(*weight) {
                let point = crc32fast::hash(format!("{node}:{replica}").as_bytes());
                self.ring.push((point, idx));
            }
        }

        let nodes = &self.nodes;
        self.ring
            .sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| nodes[a.1].0.cmp(&nodes[b.1].0)));
    }
}

impl Distributor for HashRing {
    fn add(&mut self, node: &str, weight: Option<u32>) {
        let weight = weight.unwrap_or(DEFAULT_WEIGHT);
        match self.nodes.iter_mut().find(|(id, _)| id == node) {
            Some(entry) => entry.1 = weight,
            None => self.nodes.push((node.to_string(), weight)),
        }
        self.rebuild();
    }

    fn remove(&mut self, node: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|(id, _)| id != node);
        if self.nodes.len() == before {
            return false;
        }
        self.rebuild();
        true
    }

    fn hash(&self, key: &[u8]) -> u32 {
        crc32fast::hash(key)
    }

    fn get(&self, hash: u32) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let slot = self.ring.partition_point(|(point, _)| *point < hash);
        let (_, idx) = self.ring[if slot == self.ring.len() { 0 } else { slot }];
        Some(self.nodes[idx].0.as_str())
    }

    fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
