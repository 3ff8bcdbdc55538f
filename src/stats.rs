//! Statistics and diagnostics types.

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-shard operation statistics.
#[derive(Debug, Clone, Default)]
pub struct ShardOps {
    /// Number of read operations on this shard.
    pub reads: u64,
    /// Number of write operations on this shard.
    pub writes: u64,
    /// Number of remove operations on this shard.
    pub removes: u64,
    /// Number of entries deleted by a fired expiration.
    pub expirations: u64,
}

/// Thread-safe statistics tracker for a single shard.
#[cfg(feature = "metrics")]
pub(crate) struct ShardStats {
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
    expirations: AtomicU64,
}

#[cfg(feature = "metrics")]
impl ShardStats {
    pub fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardOps {
        ShardOps {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "metrics")]
impl Default for ShardStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero-sized placeholder when metrics are disabled.
#[cfg(not(feature = "metrics"))]
pub(crate) struct ShardStats;

#[cfg(not(feature = "metrics"))]
impl ShardStats {
    pub fn new() -> Self {
        ShardStats
    }

    #[inline]
    pub fn record_read(&self) {}

    #[inline]
    pub fn record_write(&self) {}

    #[inline]
    pub fn record_remove(&self) {}

    #[inline]
    pub fn record_expiration(&self) {}

    pub fn snapshot(&self) -> ShardOps {
        ShardOps::default()
    }
}

#[cfg(not(feature = "metrics"))]
impl Default for ShardStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics for a Cache instance.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Total number of entries across all shards.
    pub size: usize,
    /// Number of entries in each shard.
    pub shard_sizes: Vec<usize>,
    /// Operation counts for each shard (all zero when the `metrics` feature
    /// is disabled).
    pub operations: Vec<ShardOps>,
}
