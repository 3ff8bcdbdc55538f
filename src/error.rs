use crate::config::MIN_REBALANCE_INTERVAL;

/// Errors that can occur when constructing or operating a Cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested key is absent or has expired.
    #[error("key not found")]
    KeyNotFound,
    /// The configured target load factor is zero.
    #[error("ideal items per shard must be greater than zero")]
    InvalidItemsPerShard,
    /// The configured rebalancing interval is below the enforced floor.
    #[error("rebalance interval must be at least {}s", MIN_REBALANCE_INTERVAL.as_secs())]
    RebalanceIntervalTooShort,
    /// A rebalancing pass computed a shard-count change it cannot apply.
    /// Never surfaced to callers; the pass that produced it is skipped.
    #[error("invalid shard count change: {current} -> {target}")]
    InvalidShardDelta {
        /// Shard count at the start of the pass.
        current: usize,
        /// Computed target shard count.
        target: usize,
    },
}
