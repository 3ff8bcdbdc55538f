use crate::config::{create_hasher, Config};
use crate::error::Error;
use crate::expiry::{spawn_expiry_worker, TimerQueue};
use crate::hash::ShardHasher;
use crate::rebalance::{spawn_rebalancer, StopFlag};
use crate::shard::Shard;
use crate::stats::{ShardOps, Stats};
use parking_lot::{Mutex, RwLock};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// The ordered collection of active shards. Replaced wholesale on every
/// shard-count change, never mutated in place, so a clone of the `Arc` is a
/// complete, immutable snapshot of the partition function.
pub(crate) type ShardSet<K, V> = Arc<Vec<Arc<Shard<K, V>>>>;

/// State shared between the public facade and the background threads.
pub(crate) struct CacheInner<K, V> {
    /// Current shard set. The lock is held only for the instant it takes to
    /// clone the `Arc` (readers) or swap it (the rebalancer) — never across
    /// a shard operation or a migration.
    pub(crate) shards: RwLock<ShardSet<K, V>>,
    pub(crate) hasher: ShardHasher,
    pub(crate) ideal_items_per_shard: usize,
    pub(crate) timers: Arc<TimerQueue<K, V>>,
    /// Serializes rebalancing passes; normal operations never take it.
    pub(crate) pass_gate: Mutex<()>,
}

impl<K, V> CacheInner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// One consistent view of the shard set for a single logical operation.
    pub(crate) fn snapshot(&self) -> ShardSet<K, V> {
        Arc::clone(&self.shards.read())
    }

    /// Route a key within a snapshot: `hash(key) mod shard_count`.
    pub(crate) fn shard_for<'a>(&self, set: &'a ShardSet<K, V>, key: &K) -> &'a Arc<Shard<K, V>> {
        let hash = self.hasher.hash_key(key);
        &set[hash as usize % set.len()]
    }
}

/// Concurrent in-process cache, partitioned across independently locked
/// shards, with per-entry expiration and load-driven resharding.
///
/// Operations take a snapshot of the current shard set and run entirely
/// against it, so they are never blocked by a rebalance beyond the instant
/// of the atomic shard-set swap. A read racing a rebalance may transiently
/// miss a key that is mid-migration; the key reappears once the pass
/// replays it. Writes that complete before a pass starts are never lost.
///
/// # Example
///
/// ```rust
/// use shardcache::Cache;
/// use std::time::Duration;
///
/// let cache = Cache::new();
/// cache.set("session:1", "alice", Duration::from_secs(60)).unwrap();
///
/// assert_eq!(*cache.get(&"session:1").unwrap(), "alice");
/// assert!(cache.has(&"session:1"));
/// ```
pub struct Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    inner: Arc<CacheInner<K, V>>,
    stop: Arc<StopFlag>,
    rebalancer: Option<JoinHandle<()>>,
    expiry_worker: Option<JoinHandle<()>>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a cache with default configuration (128 items per shard,
    /// 30s rebalancing interval, FNV-1a routing).
    pub fn new() -> Self {
        Self::with_config(Config::default()).unwrap()
    }

    /// Create a cache with custom config. Fails without spawning anything if
    /// the target load factor is zero or the rebalancing interval is below
    /// [`MIN_REBALANCE_INTERVAL`](crate::MIN_REBALANCE_INTERVAL).
    ///
    /// The cache starts as a single empty shard; the background rebalancer
    /// grows and shrinks the set from observed load.
    pub fn with_config(config: Config) -> Result<Self, Error> {
        if config.ideal_items_per_shard == 0 {
            return Err(Error::InvalidItemsPerShard);
        }
        if config.rebalance_interval < crate::MIN_REBALANCE_INTERVAL {
            return Err(Error::RebalanceIntervalTooShort);
        }

        let timers = TimerQueue::new();
        let inner = Arc::new(CacheInner {
            shards: RwLock::new(Arc::new(vec![Shard::new(Arc::clone(&timers))])),
            hasher: create_hasher(config.hash_function),
            ideal_items_per_shard: config.ideal_items_per_shard,
            timers: Arc::clone(&timers),
            pass_gate: Mutex::new(()),
        });

        let stop = Arc::new(StopFlag::new());
        let rebalancer = spawn_rebalancer(
            Arc::clone(&inner),
            config.rebalance_interval,
            Arc::clone(&stop),
        );
        let expiry_worker = spawn_expiry_worker(timers);
        debug!(
            ideal_items_per_shard = config.ideal_items_per_shard,
            interval_secs = config.rebalance_interval.as_secs(),
            "cache created"
        );

        Ok(Self {
            inner,
            stop,
            rebalancer: Some(rebalancer),
            expiry_worker: Some(expiry_worker),
        })
    }

    /// Get the value for a key. Returns an `Arc<V>` so you can share it
    /// without copying.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key is absent or its TTL has elapsed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardcache::{Cache, Error};
    /// use std::time::Duration;
    ///
    /// let cache = Cache::new();
    /// cache.set("key", "value", Duration::ZERO).unwrap();
    ///
    /// assert_eq!(*cache.get(&"key").unwrap(), "value");
    /// assert_eq!(cache.get(&"missing").unwrap_err(), Error::KeyNotFound);
    /// ```
    pub fn get(&self, key: &K) -> Result<Arc<V>, Error> {
        let set = self.inner.snapshot();
        self.inner.shard_for(&set, key).get(key)
    }

    /// Store a value. A zero `ttl` holds the key until it is deleted or
    /// migrated; a nonzero `ttl` expires it `ttl` from now, best-effort.
    ///
    /// Overwriting a key always cancels the previous TTL: a stale timer from
    /// an earlier set can never delete the new value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardcache::Cache;
    /// use std::time::Duration;
    ///
    /// let cache = Cache::new();
    /// cache.set("config", "v1", Duration::from_secs(30)).unwrap();
    /// // Overwrite with no TTL: now held indefinitely.
    /// cache.set("config", "v2", Duration::ZERO).unwrap();
    ///
    /// assert_eq!(cache.expiry(&"config").unwrap(), None);
    /// ```
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Result<(), Error> {
        let deadline = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let set = self.inner.snapshot();
        self.inner.shard_for(&set, &key).set(key, Arc::new(value), deadline);
        Ok(())
    }

    /// Remove a key. Deleting an absent key succeeds.
    pub fn delete(&self, key: &K) -> Result<(), Error> {
        let set = self.inner.snapshot();
        self.inner.shard_for(&set, key).delete(key);
        Ok(())
    }

    /// Whether the key is present and not expired.
    pub fn has(&self, key: &K) -> bool {
        let set = self.inner.snapshot();
        self.inner.shard_for(&set, key).has(key)
    }

    /// The absolute instant at which a key expires: `Ok(None)` for a key
    /// held indefinitely, [`Error::KeyNotFound`] if absent or expired.
    pub fn expiry(&self, key: &K) -> Result<Option<Instant>, Error> {
        let set = self.inner.snapshot();
        self.inner.shard_for(&set, key).expiry(key)
    }

    /// Snapshot of all keys across all shards. Taken shard by shard, so it
    /// is consistent per shard but not across the whole cache.
    pub fn keys(&self) -> Vec<K> {
        let set = self.inner.snapshot();
        let mut keys = Vec::new();
        for shard in set.iter() {
            keys.extend(shard.keys());
        }
        keys
    }

    /// Total number of entries across all shards, counting entries whose
    /// expiration is due but has not fired yet.
    pub fn len(&self) -> usize {
        let set = self.inner.snapshot();
        set.iter().map(|shard| shard.len()).sum()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of shards in the current shard set.
    pub fn shard_count(&self) -> usize {
        self.inner.snapshot().len()
    }

    /// Number of entries in each shard, in shard order.
    pub fn shard_loads(&self) -> Vec<usize> {
        let set = self.inner.snapshot();
        set.iter().map(|shard| shard.len()).collect()
    }

    /// Get detailed statistics about the cache and its shards.
    pub fn stats(&self) -> Stats {
        let set = self.inner.snapshot();
        let shard_sizes: Vec<usize> = set.iter().map(|shard| shard.len()).collect();
        let operations: Vec<ShardOps> = set.iter().map(|shard| shard.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }

    /// Run one rebalancing pass immediately, on the calling thread. The same
    /// pass the background task runs every interval; at most one pass runs
    /// at a time.
    pub fn rebalance_now(&self) {
        self.inner.rebalance();
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.stop.raise();
        self.inner.timers.shutdown();
        if let Some(handle) = self.rebalancer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.expiry_worker.take() {
            let _ = handle.join();
        }
        debug!("cache dropped, background workers joined");
    }
}
