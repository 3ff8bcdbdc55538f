//! # shardcache
//!
//! An embeddable in-process cache that shards its key space across
//! independently locked partitions, expires entries per-key, and periodically
//! resizes its shard set from observed load.
//!
//! Each shard has its own read-write lock, so operations on different shards
//! don't block each other. A background rebalancer watches the live item
//! count and grows or shrinks the shard set toward a configured target load
//! factor, migrating every entry (value and remaining TTL included) while the
//! cache stays fully usable. Values are stored behind `Arc<T>` so you can
//! share them without copying.
//!
//! ## Features
//!
//! - **Sharded**: per-shard locking bounds contention and partition size
//! - **Per-entry TTL**: expiration is a scheduled deferred deletion, not a
//!   scan; overwriting a key always cancels its previous timer
//! - **Self-sizing**: the shard set tracks `ceil(items / ideal_per_shard)`,
//!   resharding with a single atomic shard-set swap
//! - **Thread-safe**: all operations are safe for concurrent access
//! - **Deterministic routing**: same key and shard count, same shard
//! - **Managed lifecycle**: background workers stop and join on drop
//!
//! ## Example
//!
//! ```rust
//! use shardcache::Cache;
//! use std::time::Duration;
//!
//! let cache = Cache::new();
//!
//! // Held until deleted.
//! cache.set("user:42", "alice", Duration::ZERO).unwrap();
//! // Gone roughly a minute from now.
//! cache.set("session:42", "token", Duration::from_secs(60)).unwrap();
//!
//! assert_eq!(*cache.get(&"user:42").unwrap(), "alice");
//! assert!(cache.has(&"session:42"));
//!
//! cache.delete(&"user:42").unwrap();
//! assert!(!cache.has(&"user:42"));
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use shardcache::CacheBuilder;
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::new()
//!     .ideal_items_per_shard(64)?   // target load factor
//!     .rebalance_interval(Duration::from_secs(10))?  // >= 5s
//!     .build::<String, Vec<u8>>()?;
//! # drop(cache);
//! # Ok::<(), shardcache::Error>(())
//! ```
//!
//! ## Consistency
//!
//! Expiration is best-effort: a key may linger briefly past its TTL under
//! load, though reads treat it as gone the moment its deadline passes. A
//! read racing a rebalance may transiently miss a key that is mid-migration;
//! it reappears once the pass finishes. No other staleness is possible.

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Cache facade and routing.
pub mod cache;
/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Hash function implementations.
pub mod hash;
/// Internal shard implementation.
pub mod shard;
/// Deferred-deletion timer queue.
pub mod expiry;
/// Background resharding.
pub mod rebalance;
/// Statistics and metrics collection.
pub mod stats;

// Re-export main types
pub use cache::Cache;
pub use config::{CacheBuilder, Config, HashFunction, MIN_REBALANCE_INTERVAL};
pub use error::Error;
pub use stats::{ShardOps, Stats};
