use crate::cache::{CacheInner, ShardSet};
use crate::error::Error;
use crate::shard::Shard;
use parking_lot::{Condvar, Mutex};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interruptible sleep for the rebalancer thread, so dropping the cache does
/// not wait out the remainder of an interval.
pub(crate) struct StopFlag {
    raised: Mutex<bool>,
    signal: Condvar,
}

impl StopFlag {
    pub fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.signal.notify_all();
    }

    /// Sleep for `timeout` unless the flag is raised first. Returns true
    /// once raised.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock();
        if *raised {
            return true;
        }
        self.signal.wait_for(&mut raised, timeout);
        *raised
    }
}

/// Spawn the periodic rebalancing thread for a cache. One pass per interval
/// until the stop flag is raised.
pub(crate) fn spawn_rebalancer<K, V>(
    inner: Arc<CacheInner<K, V>>,
    interval: Duration,
    stop: Arc<StopFlag>,
) -> JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    std::thread::spawn(move || {
        debug!(interval_secs = interval.as_secs(), "rebalancer started");
        while !stop.wait(interval) {
            inner.rebalance();
        }
        debug!("rebalancer stopped");
    })
}

impl<K, V> CacheInner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// One rebalancing pass: recompute the ideal shard count from the live
    /// item total and, when it differs from the current count, migrate to a
    /// resized shard set. A pass that computes an unusable delta mutates
    /// nothing; the next pass retries from fresh counts.
    pub(crate) fn rebalance(&self) {
        let _gate = self.pass_gate.lock();
        let snapshot = self.snapshot();
        let current = snapshot.len();
        let total: usize = snapshot.iter().map(|shard| shard.live_len()).sum();
        let ideal = std::cmp::max(1, total.div_ceil(self.ideal_items_per_shard));
        if ideal == current {
            debug!(shards = current, items = total, "rebalance: no change");
            return;
        }

        let outcome = if ideal > current {
            self.grow(&snapshot, ideal)
        } else {
            self.shrink(&snapshot, ideal)
        };
        match outcome {
            Ok(moved) => info!(
                from = current,
                to = ideal,
                items = total,
                moved,
                "resharded"
            ),
            Err(err) => warn!(%err, "rebalance pass skipped"),
        }
    }

    /// Grow to `target` shards. Any shard-count change alters every key's
    /// `hash mod n`, so growth extracts everything, publishes a fresh set of
    /// empty shards, and replays each entry against the new partition
    /// function.
    fn grow(&self, old: &ShardSet<K, V>, target: usize) -> Result<usize, Error> {
        if target <= old.len() {
            return Err(Error::InvalidShardDelta {
                current: old.len(),
                target,
            });
        }

        let mut extracted = Vec::new();
        for shard in old.iter() {
            extracted.append(&mut shard.drain());
        }

        let next: ShardSet<K, V> = Arc::new(
            (0..target)
                .map(|_| Shard::new(Arc::clone(&self.timers)))
                .collect(),
        );
        *self.shards.write() = Arc::clone(&next);

        Ok(self.replay(&next, extracted))
    }

    /// Shrink to `target` shards. The least-loaded shards are retired and
    /// fully extracted; surviving shards keep their identity, their relative
    /// order, and every entry that still routes to them, while entries whose
    /// routing changes under the smaller set are extracted alongside.
    fn shrink(&self, old: &ShardSet<K, V>, target: usize) -> Result<usize, Error> {
        if target == 0 || target >= old.len() {
            return Err(Error::InvalidShardDelta {
                current: old.len(),
                target,
            });
        }

        let mut by_load: Vec<usize> = (0..old.len()).collect();
        by_load.sort_by_key(|&index| old[index].len());
        let mut retire = vec![false; old.len()];
        for &index in &by_load[..old.len() - target] {
            retire[index] = true;
        }

        let mut survivors: Vec<Arc<Shard<K, V>>> = Vec::with_capacity(target);
        let mut extracted = Vec::new();
        for (index, shard) in old.iter().enumerate() {
            if retire[index] {
                extracted.append(&mut shard.drain());
            } else {
                survivors.push(Arc::clone(shard));
            }
        }
        for (new_index, shard) in survivors.iter().enumerate() {
            extracted.append(&mut shard.drain_misplaced(new_index, target, &self.hasher));
        }

        let next: ShardSet<K, V> = Arc::new(survivors);
        *self.shards.write() = Arc::clone(&next);

        Ok(self.replay(&next, extracted))
    }

    /// Replay extracted entries through the ordinary set path so each lands
    /// on its shard under the new partition function. Entries already past
    /// their deadline at extraction are dropped instead of replayed; live
    /// ones keep their original absolute deadline, so migration never
    /// stretches a TTL.
    fn replay(
        &self,
        set: &ShardSet<K, V>,
        extracted: Vec<(K, Arc<V>, Option<Instant>)>,
    ) -> usize {
        let now = Instant::now();
        let mut moved = 0;
        for (key, value, deadline) in extracted {
            if deadline.is_some_and(|deadline| deadline <= now) {
                continue;
            }
            self.shard_for(set, &key).set(key, value, deadline);
            moved += 1;
        }
        moved
    }
}
