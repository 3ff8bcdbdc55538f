use std::hash::{Hash, Hasher};

/// Hash function implementation for shard routing.
/// Uses an enum to avoid trait object limitations with generics.
pub enum ShardHasher {
    /// FNV-1a implementation (default, order-sensitive and uniform over byte strings).
    Fnv,
    /// AHash implementation (faster on long keys).
    AHash,
}

impl ShardHasher {
    /// Hash a key to the 32-bit value routing is computed from.
    ///
    /// Pure and deterministic: the same key always produces the same hash,
    /// so `hash % shard_count` is stable for a fixed shard count.
    pub fn hash_key<K: Hash>(&self, key: &K) -> u32 {
        match self {
            ShardHasher::Fnv => {
                let mut hasher = fnv::FnvHasher::default();
                key.hash(&mut hasher);
                hasher.finish() as u32
            }
            ShardHasher::AHash => {
                let mut hasher = ahash::AHasher::default();
                key.hash(&mut hasher);
                hasher.finish() as u32
            }
        }
    }
}

impl Default for ShardHasher {
    fn default() -> Self {
        ShardHasher::Fnv
    }
}
