use shardcache::{Cache, CacheBuilder, Error};
use std::thread::sleep;
use std::time::Duration;

fn cache_with_ideal(ideal: usize) -> Cache<String, String> {
    CacheBuilder::new()
        .ideal_items_per_shard(ideal)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn test_grow_to_ideal_count() {
    let cache = cache_with_ideal(2);

    for i in 0..5 {
        cache
            .set(format!("key_{}", i), format!("value_{}", i), Duration::ZERO)
            .unwrap();
    }
    assert_eq!(cache.shard_count(), 1);

    cache.rebalance_now();

    // ceil(5 / 2) = 3 shards, every entry still reachable
    assert_eq!(cache.shard_count(), 3);
    for i in 0..5 {
        assert_eq!(
            *cache.get(&format!("key_{}", i)).unwrap(),
            format!("value_{}", i)
        );
    }
    assert_eq!(cache.shard_loads().iter().sum::<usize>(), 5);
}

#[test]
fn test_noop_when_balanced() {
    let cache = cache_with_ideal(2);

    cache.set("a".into(), "1".into(), Duration::ZERO).unwrap();
    cache.set("b".into(), "2".into(), Duration::ZERO).unwrap();

    // ceil(2 / 2) = 1, which is the current count
    cache.rebalance_now();
    assert_eq!(cache.shard_count(), 1);
}

#[test]
fn test_shrink_to_single_shard() {
    let cache = cache_with_ideal(1);

    for i in 0..4 {
        cache
            .set(format!("key_{}", i), format!("value_{}", i), Duration::ZERO)
            .unwrap();
    }
    cache.rebalance_now();
    assert_eq!(cache.shard_count(), 4);

    for i in 1..4 {
        cache.delete(&format!("key_{}", i)).unwrap();
    }
    cache.rebalance_now();

    assert_eq!(cache.shard_count(), 1);
    assert_eq!(*cache.get(&"key_0".to_string()).unwrap(), "value_0");
}

#[test]
fn test_partial_shrink_keeps_every_entry() {
    let cache = cache_with_ideal(1);

    for i in 0..12 {
        cache
            .set(format!("key_{}", i), format!("value_{}", i), Duration::ZERO)
            .unwrap();
    }
    cache.rebalance_now();
    assert_eq!(cache.shard_count(), 12);

    for i in 5..12 {
        cache.delete(&format!("key_{}", i)).unwrap();
    }
    cache.rebalance_now();

    // 5 entries left, one per shard, and each still routes to a live shard
    assert_eq!(cache.shard_count(), 5);
    for i in 0..5 {
        assert_eq!(
            *cache.get(&format!("key_{}", i)).unwrap(),
            format!("value_{}", i)
        );
    }
    assert_eq!(cache.shard_loads().iter().sum::<usize>(), 5);
}

#[test]
fn test_migration_preserves_ttl() {
    let cache = cache_with_ideal(2);

    cache
        .set("mortal".into(), "v".into(), Duration::from_secs(60))
        .unwrap();
    for i in 0..4 {
        cache
            .set(format!("filler_{}", i), "v".into(), Duration::ZERO)
            .unwrap();
    }
    let deadline_before = cache.expiry(&"mortal".to_string()).unwrap().unwrap();

    cache.rebalance_now();
    assert!(cache.shard_count() > 1);

    // Migration carries the absolute deadline over unchanged
    let deadline_after = cache.expiry(&"mortal".to_string()).unwrap().unwrap();
    assert_eq!(deadline_before, deadline_after);

    // No-expiry entries stay that way
    assert_eq!(cache.expiry(&"filler_0".to_string()).unwrap(), None);
}

#[test]
fn test_migrated_ttl_still_fires() {
    let cache = cache_with_ideal(2);

    cache
        .set("short".into(), "v".into(), Duration::from_millis(300))
        .unwrap();
    for i in 0..4 {
        cache
            .set(format!("filler_{}", i), "v".into(), Duration::ZERO)
            .unwrap();
    }
    cache.rebalance_now();

    sleep(Duration::from_millis(700));

    assert_eq!(
        cache.get(&"short".to_string()).unwrap_err(),
        Error::KeyNotFound
    );
    for i in 0..4 {
        assert!(cache.has(&format!("filler_{}", i)));
    }
}

#[test]
fn test_expired_entries_are_not_migrated() {
    let cache = cache_with_ideal(2);

    cache
        .set("dying".into(), "v".into(), Duration::from_millis(100))
        .unwrap();
    sleep(Duration::from_millis(300));

    for i in 0..5 {
        cache
            .set(format!("key_{}", i), "v".into(), Duration::ZERO)
            .unwrap();
    }
    cache.rebalance_now();

    assert!(!cache.has(&"dying".to_string()));
    assert_eq!(cache.len(), 5);
}

#[test]
fn test_background_rebalancer_ticks() {
    let cache: Cache<String, String> = CacheBuilder::new()
        .ideal_items_per_shard(1)
        .unwrap()
        .rebalance_interval(Duration::from_secs(5))
        .unwrap()
        .build()
        .unwrap();

    for i in 0..3 {
        cache
            .set(format!("key_{}", i), "v".into(), Duration::ZERO)
            .unwrap();
    }
    assert_eq!(cache.shard_count(), 1);

    // One interval plus slack: the background pass must have resharded
    sleep(Duration::from_millis(6500));

    assert_eq!(cache.shard_count(), 3);
    for i in 0..3 {
        assert!(cache.has(&format!("key_{}", i)));
    }
}

#[test]
fn test_load_spreads_after_growth() {
    let cache = cache_with_ideal(8);

    for i in 0..40 {
        cache
            .set(format!("key_{}", i), "v".into(), Duration::ZERO)
            .unwrap();
    }
    cache.rebalance_now();

    let loads = cache.shard_loads();
    assert_eq!(loads.len(), 5);
    assert_eq!(loads.iter().sum::<usize>(), 40);
    // Routing actually spreads the keys instead of piling on one shard
    assert!(loads.iter().filter(|&&load| load > 0).count() > 1);
}
