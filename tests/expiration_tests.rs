use shardcache::{Cache, Error};
use std::thread::sleep;
use std::time::{Duration, Instant};

#[test]
fn test_entry_expires() {
    let cache = Cache::new();

    cache.set("key", "value", Duration::from_millis(150)).unwrap();
    assert_eq!(*cache.get(&"key").unwrap(), "value");

    sleep(Duration::from_millis(500));

    assert_eq!(cache.get(&"key").unwrap_err(), Error::KeyNotFound);
    assert!(!cache.has(&"key"));
    // The deferred deletion has fired, not just hidden the key
    assert_eq!(cache.len(), 0);
}

#[test]
fn test_zero_ttl_is_held() {
    let cache = Cache::new();

    cache.set("key", "value", Duration::ZERO).unwrap();
    sleep(Duration::from_millis(400));

    assert_eq!(*cache.get(&"key").unwrap(), "value");
    assert_eq!(cache.expiry(&"key").unwrap(), None);
}

#[test]
fn test_overwrite_clears_ttl() {
    let cache = Cache::new();

    // A short-lived value overwritten by one with no TTL: the original
    // timer must not delete the replacement.
    cache.set("key", "v1", Duration::from_millis(200)).unwrap();
    cache.set("key", "v2", Duration::ZERO).unwrap();

    sleep(Duration::from_millis(600));

    assert_eq!(*cache.get(&"key").unwrap(), "v2");
    assert_eq!(cache.expiry(&"key").unwrap(), None);
}

#[test]
fn test_overwrite_replaces_ttl() {
    let cache = Cache::new();

    cache.set("key", "v1", Duration::from_millis(150)).unwrap();
    cache.set("key", "v2", Duration::from_millis(800)).unwrap();

    // Past the first TTL but inside the second: the overwrite's TTL governs
    sleep(Duration::from_millis(400));
    assert_eq!(*cache.get(&"key").unwrap(), "v2");

    sleep(Duration::from_millis(700));
    assert_eq!(cache.get(&"key").unwrap_err(), Error::KeyNotFound);
}

#[test]
fn test_delete_cancels_pending_expiration() {
    let cache = Cache::new();

    cache.set("key", "v1", Duration::from_millis(150)).unwrap();
    cache.delete(&"key").unwrap();
    cache.set("key", "v2", Duration::ZERO).unwrap();

    sleep(Duration::from_millis(500));

    assert_eq!(*cache.get(&"key").unwrap(), "v2");
}

#[test]
fn test_read_treats_due_key_as_gone() {
    let cache = Cache::new();

    cache.set("key", "value", Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(300));

    // Regardless of whether the deferred deletion has fired yet, the key
    // must not be observable past its deadline.
    assert!(!cache.has(&"key"));
    assert_eq!(cache.get(&"key").unwrap_err(), Error::KeyNotFound);
    assert_eq!(cache.expiry(&"key").unwrap_err(), Error::KeyNotFound);
}

#[test]
fn test_independent_ttls() {
    let cache = Cache::new();

    let start = Instant::now();
    cache.set("short", 1, Duration::from_millis(150)).unwrap();
    cache.set("long", 2, Duration::from_secs(60)).unwrap();
    cache.set("forever", 3, Duration::ZERO).unwrap();

    sleep(Duration::from_millis(500));

    assert_eq!(cache.get(&"short").unwrap_err(), Error::KeyNotFound);
    assert_eq!(*cache.get(&"long").unwrap(), 2);
    assert_eq!(*cache.get(&"forever").unwrap(), 3);

    let deadline = cache.expiry(&"long").unwrap().unwrap();
    assert!(deadline > start + Duration::from_secs(59));
}
