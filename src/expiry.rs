use crate::shard::Shard;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, trace};

/// One pending deferred deletion.
///
/// Holds the shard weakly: when rebalancing discards a shard, the entries
/// scheduled against it resolve to nothing and are dropped unfired.
struct TimerEntry<K, V> {
    deadline: Instant,
    token: u64,
    shard: Weak<Shard<K, V>>,
    key: K,
}

impl<K, V> PartialEq for TimerEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.token == other.token
    }
}

impl<K, V> Eq for TimerEntry<K, V> {}

impl<K, V> PartialOrd for TimerEntry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, V> Ord for TimerEntry<K, V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.token.cmp(&other.token))
    }
}

struct TimerState<K, V> {
    heap: BinaryHeap<Reverse<TimerEntry<K, V>>>,
    shutdown: bool,
}

/// Deadline-ordered queue of deferred deletions, serviced by one worker
/// thread per cache.
///
/// Cancellation is lazy: a set or delete that supersedes a schedule changes
/// the token recorded in the shard, and the stale heap entry is discarded
/// when it comes due. The worker runs each deletion under the owning shard's
/// write lock, so it serializes with concurrent sets and deletes.
pub(crate) struct TimerQueue<K, V> {
    inner: Mutex<TimerState<K, V>>,
    tick: Condvar,
    next_token: AtomicU64,
}

impl<K, V> TimerQueue<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                shutdown: false,
            }),
            tick: Condvar::new(),
            next_token: AtomicU64::new(0),
        })
    }

    /// Schedule a deletion of `key` on `shard` at `deadline`. Returns the
    /// token the shard must record; only the schedule holding the recorded
    /// token is allowed to fire.
    pub fn schedule(&self, shard: &Weak<Shard<K, V>>, key: K, deadline: Instant) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.lock();
            inner.heap.push(Reverse(TimerEntry {
                deadline,
                token,
                shard: shard.clone(),
                key,
            }));
        }
        self.tick.notify_one();
        token
    }

    /// Stop the worker. Pending entries are dropped unfired.
    pub fn shutdown(&self) {
        self.inner.lock().shutdown = true;
        self.tick.notify_all();
    }

    /// Worker loop: sleep until the earliest deadline, pop due entries, and
    /// apply each against its shard. The queue lock is released while the
    /// deletion runs so schedulers are never blocked behind a shard lock.
    fn run(&self) {
        debug!("expiry worker started");
        let mut inner = self.inner.lock();
        loop {
            if inner.shutdown {
                debug!("expiry worker stopped");
                return;
            }
            let now = Instant::now();
            let next_deadline = inner.heap.peek().map(|Reverse(entry)| entry.deadline);
            match next_deadline {
                Some(deadline) if deadline <= now => {
                    if let Some(Reverse(entry)) = inner.heap.pop() {
                        MutexGuard::unlocked(&mut inner, || {
                            if let Some(shard) = entry.shard.upgrade() {
                                if shard.expire(&entry.key, entry.token) {
                                    trace!(token = entry.token, "expired entry removed");
                                }
                            }
                        });
                    }
                }
                Some(deadline) => {
                    self.tick.wait_until(&mut inner, deadline);
                }
                None => {
                    self.tick.wait(&mut inner);
                }
            }
        }
    }
}

/// Spawn the worker thread servicing `queue`. Joined by the cache's `Drop`
/// after `shutdown`.
pub(crate) fn spawn_expiry_worker<K, V>(queue: Arc<TimerQueue<K, V>>) -> JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    std::thread::spawn(move || queue.run())
}
