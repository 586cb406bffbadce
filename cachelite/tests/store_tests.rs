//! Integration tests for the cache store
//!
//! Covers expiry, bounded eviction and concurrent access through the public
//! API only.

#[path = "testutils/mod.rs"]
mod testutils;

use cachelite::{CacheError, EvictionPolicy, ManualClock, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use testutils::fixtures::{init_logging, store};

#[test]
fn test_expired_key_reads_as_miss() {
    init_logging();
    let clock = ManualClock::starting_now();
    let store = store(StoreConfig::default(), &clock);

    store
        .set("A", "v".to_string(), Some(Duration::from_secs(1)), None)
        .unwrap();
    clock.advance(Duration::from_secs(2));

    assert!(store.get("A").is_none());
    let stats = store.stats();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entry_count, 0);
}

#[test]
fn test_lru_capacity_two_evicts_oldest() {
    init_logging();
    let clock = ManualClock::starting_now();
    let config = StoreConfig {
        max_size: 2,
        eviction_policy: EvictionPolicy::Lru,
        ..StoreConfig::default()
    };
    let store = store(config, &clock);

    for key in ["A", "B", "C"] {
        store.set(key, key.to_lowercase(), None, None).unwrap();
        clock.advance(Duration::from_millis(10));
    }

    assert!(!store.exists("A"));
    assert!(store.exists("B"));
    assert!(store.exists("C"));
    assert_eq!(store.stats().evictions, 1);
}

#[test]
fn test_entry_larger_than_memory_bound_fails() {
    init_logging();
    let clock = ManualClock::starting_now();
    let config = StoreConfig {
        max_memory_bytes: 16,
        ..StoreConfig::default()
    };
    let store = store(config, &clock);

    let result = store.set("big", "x".repeat(64), None, None);
    assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));
    assert!(store.is_empty());
}

#[test]
fn test_bounds_hold_under_concurrent_writers() {
    init_logging();
    let clock = ManualClock::starting_now();
    let config = StoreConfig {
        max_size: 50,
        ..StoreConfig::default()
    };
    let store = store(config, &clock);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("w{}:{}", worker, fastrand::u32(..100));
                    store.set(key, format!("{}", i), None, None).unwrap();
                    let _ = store.get(&format!("w{}:{}", worker, fastrand::u32(..100)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = store.stats();
    assert!(stats.entry_count <= 50);
    assert_eq!(stats.entry_count, store.len());
    assert_eq!(stats.hits + stats.misses, 800);
    assert_eq!(stats.insertions, 800);
}

#[test]
fn test_near_expiry_read_reaches_refresh_stream() {
    init_logging();
    let clock = ManualClock::starting_now();
    let store = store(StoreConfig::default(), &clock);
    let mut signals = store.take_refresh_receiver().unwrap();

    store
        .set("quote:AAPL", "189.2".to_string(), Some(Duration::from_secs(100)), None)
        .unwrap();
    clock.advance(Duration::from_secs(95));

    assert!(store.get("quote:AAPL").is_some());
    assert_eq!(signals.try_recv().unwrap().key, "quote:AAPL");
    assert!(store.take_refresh_receiver().is_none());
}
