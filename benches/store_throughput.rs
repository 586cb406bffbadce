/// Benchmark for cache store throughput
///
/// Measures single-threaded get/set throughput under each eviction policy,
/// then contended reads from several threads sharing one store, and the
/// cost of recording accesses in the pattern analyzer.

use cachelite::{AccessPatternAnalyzer, AnalyzerConfig, CacheStore, EvictionPolicy, StoreConfig};
use std::sync::Arc;
use std::time::Instant;

const KEYS: usize = 10_000;
const OPERATIONS: usize = 200_000;

fn main() {
    println!("=== Cache Store Throughput Benchmark ===\n");

    for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu, EvictionPolicy::Ttl] {
        println!("📊 Mixed get/set under {} eviction (capacity {}):", policy, KEYS / 2);
        let store: CacheStore<String> = CacheStore::new(StoreConfig {
            max_size: KEYS / 2,
            eviction_policy: policy,
            ..StoreConfig::default()
        })
        .expect("Failed to create store");

        let start = Instant::now();
        for i in 0..OPERATIONS {
            let key = format!("key:{}", fastrand::usize(..KEYS));
            if store.get(&key).is_none() {
                store.set(key, format!("value {}", i), None, None).ok();
            }
        }
        let duration = start.elapsed();

        let stats = store.stats();
        println!("  Operations: {}", OPERATIONS);
        println!("  Time: {:?}", duration);
        println!(
            "  Throughput: {:.0} ops/sec",
            OPERATIONS as f64 / duration.as_secs_f64()
        );
        println!(
            "  Hit rate: {:.1}%, evictions: {}",
            stats.hit_rate * 100.0,
            stats.evictions
        );
        println!();
    }

    println!("📊 Concurrent Reads (4 threads, warm store):");
    let store: Arc<CacheStore<String>> = Arc::new(
        CacheStore::new(StoreConfig {
            max_size: KEYS,
            ..StoreConfig::default()
        })
        .expect("Failed to create store"),
    );
    for i in 0..KEYS {
        store.set(format!("key:{}", i), format!("value {}", i), None, None).ok();
    }

    let start = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..OPERATIONS / 4 {
                    let _value = store.get(&format!("key:{}", fastrand::usize(..KEYS)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Reader thread panicked");
    }
    let duration = start.elapsed();
    println!("  Reads: {}", OPERATIONS);
    println!("  Time: {:?}", duration);
    println!(
        "  Throughput: {:.0} reads/sec",
        OPERATIONS as f64 / duration.as_secs_f64()
    );
    println!();

    println!("📊 Access Pattern Recording:");
    let analyzer = AccessPatternAnalyzer::new(AnalyzerConfig::default())
        .expect("Failed to create analyzer");
    let start = Instant::now();
    for _ in 0..OPERATIONS {
        let key = format!("quote:{}", fastrand::usize(..KEYS / 10));
        analyzer.record_access(&key, "quote", None);
    }
    let duration = start.elapsed();
    println!("  Accesses: {}", OPERATIONS);
    println!("  Tracked keys: {}", analyzer.tracked_keys());
    println!("  Time: {:?}", duration);
    println!(
        "  Throughput: {:.0} records/sec",
        OPERATIONS as f64 / duration.as_secs_f64()
    );

    println!("\n=== Benchmark Complete ===");
}
