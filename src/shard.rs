use crate::expiry::TimerQueue;
use crate::hash::ShardHasher;
use crate::stats::ShardStats;
use crate::Error;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Expiration metadata for a single key.
///
/// `token` identifies the one live deferred deletion scheduled for the key.
/// A firing timer whose token no longer matches has been superseded by a
/// later set or delete and must not touch the entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpiryRecord {
    pub(crate) deadline: Instant,
    pub(crate) token: u64,
}

/// The two co-indexed maps a shard protects with one lock. Every mutation of
/// `entries` is paired with the matching mutation of `expirations` before the
/// lock is released.
struct ShardState<K, V> {
    entries: HashMap<K, Arc<V>>,
    expirations: HashMap<K, ExpiryRecord>,
}

impl<K: Hash + Eq, V> ShardState<K, V> {
    /// A key counts as expired once its recorded deadline has passed, even if
    /// the deferred deletion has not fired yet.
    fn is_expired(&self, key: &K, now: Instant) -> bool {
        self.expirations
            .get(key)
            .is_some_and(|record| record.deadline <= now)
    }
}

/// A single partition of the key space: value and expiry maps behind a
/// read-write lock, plus the timer queue deferred deletions are scheduled on.
pub(crate) struct Shard<K, V> {
    state: RwLock<ShardState<K, V>>,
    timers: Arc<TimerQueue<K, V>>,
    weak_self: Weak<Shard<K, V>>,
    stats: ShardStats,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Create an empty shard bound to the cache's timer queue. Shards hand the
    /// queue a weak reference to themselves, so a shard discarded by
    /// rebalancing silently cancels whatever it still had scheduled.
    pub fn new(timers: Arc<TimerQueue<K, V>>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state: RwLock::new(ShardState {
                entries: HashMap::new(),
                expirations: HashMap::new(),
            }),
            timers,
            weak_self: weak.clone(),
            stats: ShardStats::new(),
        })
    }

    /// Get the value for a key, unless it is absent or already expired.
    pub fn get(&self, key: &K) -> Result<Arc<V>, Error> {
        let state = self.state.read();
        if state.is_expired(key, Instant::now()) {
            return Err(Error::KeyNotFound);
        }
        match state.entries.get(key) {
            Some(value) => {
                self.stats.record_read();
                Ok(Arc::clone(value))
            }
            None => Err(Error::KeyNotFound),
        }
    }

    /// Store a value. A `deadline` schedules a deferred deletion for that
    /// instant; `None` holds the key indefinitely. Either way any deletion
    /// scheduled by an earlier set of this key is invalidated first.
    pub fn set(&self, key: K, value: Arc<V>, deadline: Option<Instant>) {
        let mut state = self.state.write();
        match deadline {
            Some(deadline) => {
                let token = self.timers.schedule(&self.weak_self, key.clone(), deadline);
                state.expirations.insert(key.clone(), ExpiryRecord { deadline, token });
            }
            None => {
                state.expirations.remove(&key);
            }
        }
        state.entries.insert(key, value);
        self.stats.record_write();
    }

    /// Remove a key, its value and its expiry metadata. Removing an absent
    /// key is a no-op.
    pub fn delete(&self, key: &K) {
        let mut state = self.state.write();
        state.expirations.remove(key);
        if state.entries.remove(key).is_some() {
            self.stats.record_remove();
        }
    }

    /// Whether the key is present and not expired.
    pub fn has(&self, key: &K) -> bool {
        let state = self.state.read();
        state.entries.contains_key(key) && !state.is_expired(key, Instant::now())
    }

    /// Snapshot of the keys currently present. May still include keys whose
    /// deferred deletion is due but has not fired.
    pub fn keys(&self) -> Vec<K> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// The absolute expiration instant for a key: `Ok(None)` for a key held
    /// indefinitely, `Err(KeyNotFound)` if absent or expired.
    pub fn expiry(&self, key: &K) -> Result<Option<Instant>, Error> {
        let state = self.state.read();
        if !state.entries.contains_key(key) {
            return Err(Error::KeyNotFound);
        }
        match state.expirations.get(key) {
            Some(record) if record.deadline <= Instant::now() => Err(Error::KeyNotFound),
            Some(record) => Ok(Some(record.deadline)),
            None => Ok(None),
        }
    }

    /// Number of entries, counting ones that are expired but not yet removed.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Number of entries that have not expired. This is what the rebalancer
    /// sizes the shard set from.
    pub fn live_len(&self) -> usize {
        let state = self.state.read();
        let now = Instant::now();
        let dead = state
            .expirations
            .values()
            .filter(|record| record.deadline <= now)
            .count();
        state.entries.len() - dead
    }

    /// Called by the timer worker when a scheduled deletion comes due.
    /// Deletes the key only if `token` still identifies the live schedule;
    /// a mismatch means a later set or delete superseded this timer.
    pub(crate) fn expire(&self, key: &K, token: u64) -> bool {
        let mut state = self.state.write();
        match state.expirations.get(key) {
            Some(record) if record.token == token => {
                state.expirations.remove(key);
                state.entries.remove(key);
                self.stats.record_expiration();
                true
            }
            _ => false,
        }
    }

    /// Remove and return every entry with its deadline, leaving the shard
    /// empty. Dropping the expiry records invalidates all scheduled
    /// deletions for the drained keys.
    pub(crate) fn drain(&self) -> Vec<(K, Arc<V>, Option<Instant>)> {
        let mut state = self.state.write();
        let mut expirations = std::mem::take(&mut state.expirations);
        state
            .entries
            .drain()
            .map(|(key, value)| {
                let deadline = expirations.remove(&key).map(|record| record.deadline);
                (key, value, deadline)
            })
            .collect()
    }

    /// Remove and return the entries that no longer route to this shard when
    /// it sits at `own_index` in a set of `shard_count` shards. Entries that
    /// still route here are left untouched, schedules included.
    pub(crate) fn drain_misplaced(
        &self,
        own_index: usize,
        shard_count: usize,
        hasher: &ShardHasher,
    ) -> Vec<(K, Arc<V>, Option<Instant>)> {
        let mut state = self.state.write();
        let misplaced: Vec<K> = state
            .entries
            .keys()
            .filter(|key| hasher.hash_key(key) as usize % shard_count != own_index)
            .cloned()
            .collect();
        let mut extracted = Vec::with_capacity(misplaced.len());
        for key in misplaced {
            if let Some(value) = state.entries.remove(&key) {
                let deadline = state.expirations.remove(&key).map(|record| record.deadline);
                extracted.push((key, value, deadline));
            }
        }
        extracted
    }

    /// Get a snapshot of statistics for this shard.
    pub fn stats(&self) -> crate::stats::ShardOps {
        self.stats.snapshot()
    }
}
