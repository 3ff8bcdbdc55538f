use crate::error::Error;
use crate::hash::ShardHasher;
use std::time::Duration;

/// Minimum accepted rebalancing interval. Bounds the overhead of the
/// background pass: a full migration is O(total items), so it must not be
/// allowed to run arbitrarily often.
pub const MIN_REBALANCE_INTERVAL: Duration = Duration::from_secs(5);

/// Which hash function to use for shard routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use FNV-1a (default, order-sensitive and uniform over byte strings).
    #[default]
    Fnv,
    /// Use ahash (faster on long keys).
    AHash,
}

/// Configuration for a Cache instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) ideal_items_per_shard: usize,
    pub(crate) rebalance_interval: Duration,
    pub(crate) hash_function: HashFunction,
}

impl Config {
    /// Create a new config with defaults (128 items per shard, 30s interval, FNV-1a).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target number of items per shard. Must be greater than 0.
    ///
    /// The rebalancer sizes the shard set to `ceil(total_items / ideal)`.
    pub fn ideal_items_per_shard(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidItemsPerShard);
        }
        self.ideal_items_per_shard = count;
        Ok(self)
    }

    /// Set how often the background rebalancer runs. Must be at least
    /// [`MIN_REBALANCE_INTERVAL`].
    pub fn rebalance_interval(mut self, interval: Duration) -> Result<Self, Error> {
        if interval < MIN_REBALANCE_INTERVAL {
            return Err(Error::RebalanceIntervalTooShort);
        }
        self.rebalance_interval = interval;
        Ok(self)
    }

    /// Set the hash function used for routing.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ideal_items_per_shard: 128,
            rebalance_interval: Duration::from_secs(30),
            hash_function: HashFunction::Fnv,
        }
    }
}

/// Builder for creating a Cache with custom configuration.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    config: Config,
}

impl CacheBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the target number of items per shard. Must be greater than 0.
    pub fn ideal_items_per_shard(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.ideal_items_per_shard(count)?;
        Ok(self)
    }

    /// Set how often the background rebalancer runs. Must be at least
    /// [`MIN_REBALANCE_INTERVAL`].
    pub fn rebalance_interval(mut self, interval: Duration) -> Result<Self, Error> {
        self.config = self.config.rebalance_interval(interval)?;
        Ok(self)
    }

    /// Set the hash function used for routing.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// Build a Cache with the configured settings.
    pub fn build<K, V>(self) -> Result<crate::Cache<K, V>, Error>
    where
        K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        crate::Cache::with_config(self.config)
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a hash function instance based on the configuration.
pub(crate) fn create_hasher(hash_fn: HashFunction) -> ShardHasher {
    match hash_fn {
        HashFunction::Fnv => ShardHasher::Fnv,
        HashFunction::AHash => ShardHasher::AHash,
    }
}
