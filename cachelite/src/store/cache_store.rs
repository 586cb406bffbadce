// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded cache store with pluggable eviction

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::entry::DEFAULT_PRIORITY;
use super::eviction::select_victim;
use super::stats::StoreCounters;
use super::store_config::{MAX_TTL, MAX_TTL_MULTIPLIER, MIN_TTL_MULTIPLIER};
use super::{CacheEntry, CacheStats, CacheValue, EntryInfo, EvictionPolicy, StoreConfig};
use crate::clock::{system_clock, SharedClock};
use crate::error::{CacheError, CacheResult};

/// Parameters the adaptive strategy may read and rewrite by name
pub const PARAM_MAX_SIZE: &str = "max_size";
pub const PARAM_MAX_MEMORY: &str = "max_memory_bytes";
pub const PARAM_TTL_MULTIPLIER: &str = "ttl_multiplier";
pub const PARAM_DEFAULT_TTL_SECS: &str = "default_ttl_secs";

/// Result of a read
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    Hit {
        value: Arc<V>,
        /// Remaining TTL fell below the entry's refresh threshold
        near_expiry: bool,
    },
    Miss,
}

impl<V> Lookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit { .. })
    }

    pub fn into_value(self) -> Option<Arc<V>> {
        match self {
            Lookup::Hit { value, .. } => Some(value),
            Lookup::Miss => None,
        }
    }
}

/// Near-expiry notification consumed by the preload scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub key: String,
}

struct StoreState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    memory_usage: usize,
    next_sequence: u64,
    policy: EvictionPolicy,
    max_size: usize,
    max_memory_bytes: usize,
    default_ttl: Option<Duration>,
    ttl_multiplier: f64,
    counters: StoreCounters,
}

impl<V> StoreState<V> {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let removed = self.entries.remove(key)?;
        self.memory_usage = self.memory_usage.saturating_sub(removed.size_bytes);
        Some(removed)
    }

    fn evict_one(&mut self) -> bool {
        let victim = match select_victim(self.policy, self.entries.values()) {
            Some(entry) => entry.key.clone(),
            None => return false,
        };

        if self.remove_entry(&victim).is_some() {
            self.counters.evictions += 1;
            log::debug!("evicted key={} policy={}", victim, self.policy);
        }
        true
    }

    /// Evict until one more entry of `incoming` bytes fits both bounds
    fn ensure_capacity(&mut self, incoming: usize) -> CacheResult<()> {
        if incoming > self.max_memory_bytes || self.max_size == 0 {
            return Err(CacheError::CapacityExceeded {
                requested: incoming,
                limit: self.max_memory_bytes,
            });
        }

        while self.entries.len() + 1 > self.max_size
            || self.memory_usage + incoming > self.max_memory_bytes
        {
            if !self.evict_one() {
                return Err(CacheError::CapacityExceeded {
                    requested: incoming,
                    limit: self.max_memory_bytes,
                });
            }
        }

        Ok(())
    }

    /// Evict until the current contents satisfy both bounds
    fn shrink_to_bounds(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_size || self.memory_usage > self.max_memory_bytes {
            if !self.evict_one() {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    fn effective_default_ttl(&self) -> Option<Duration> {
        self.default_ttl.map(|ttl| {
            Duration::try_from_secs_f64(ttl.as_secs_f64() * self.ttl_multiplier)
                .map_or(MAX_TTL, |scaled| scaled.min(MAX_TTL))
        })
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits,
            misses: self.counters.misses,
            expired: self.counters.expired,
            evictions: self.counters.evictions,
            insertions: self.counters.insertions,
            memory_usage_bytes: self.memory_usage,
            entry_count: self.entries.len(),
            hit_rate: self.counters.hit_rate(),
            max_size: self.max_size,
            max_memory_bytes: self.max_memory_bytes,
            average_access_time_ms: self.counters.average_access_time_ms(),
            refresh_signals: self.counters.refresh_signals,
            dropped_refresh_signals: self.counters.dropped_refresh_signals,
        }
    }
}

/// Bounded key/value store
///
/// All structural mutation happens under one lock. `get` touches entry
/// metadata inside the same critical section, so lazy expiry never races a
/// concurrent writer. Values are handed out as `Arc<V>` and used outside the
/// lock.
pub struct CacheStore<V> {
    state: Mutex<StoreState<V>>,
    clock: SharedClock,
    refresh_threshold: f64,
    refresh_tx: mpsc::Sender<RefreshSignal>,
    refresh_rx: Mutex<Option<mpsc::Receiver<RefreshSignal>>>,
}

impl<V: CacheValue> CacheStore<V> {
    pub fn new(config: StoreConfig) -> CacheResult<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: StoreConfig, clock: SharedClock) -> CacheResult<Self> {
        config.validate()?;

        let (refresh_tx, refresh_rx) = mpsc::channel(config.refresh_signal_capacity.max(1));

        Ok(Self {
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                memory_usage: 0,
                next_sequence: 0,
                policy: config.eviction_policy,
                max_size: config.max_size,
                max_memory_bytes: config.max_memory_bytes,
                default_ttl: config.default_ttl,
                ttl_multiplier: config.ttl_multiplier,
                counters: StoreCounters::default(),
            }),
            clock,
            refresh_threshold: config.refresh_threshold,
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
        })
    }

    /// Read a key, touching its metadata on hit
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired = match state.entries.get(key).map(|entry| entry.is_expired_at(now)) {
            Some(expired) => expired,
            None => {
                state.counters.misses += 1;
                record_access_time(&mut state.counters, started);
                return Lookup::Miss;
            }
        };

        if expired {
            state.remove_entry(key);
            state.counters.expired += 1;
            state.counters.misses += 1;
            record_access_time(&mut state.counters, started);
            log::debug!("lazily expired key={}", key);
            return Lookup::Miss;
        }

        let (value, near_expiry, first_signal) = match state.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                let near_expiry = entry.needs_refresh_at(now);
                let first_signal = near_expiry && !entry.refresh_signaled;
                if first_signal {
                    entry.refresh_signaled = true;
                }
                (Arc::clone(&entry.value), near_expiry, first_signal)
            }
            None => return Lookup::Miss,
        };

        state.counters.hits += 1;
        if first_signal {
            match self.refresh_tx.try_send(RefreshSignal {
                key: key.to_string(),
            }) {
                Ok(()) => state.counters.refresh_signals += 1,
                Err(_) => state.counters.dropped_refresh_signals += 1,
            }
        }
        record_access_time(&mut state.counters, started);

        Lookup::Hit { value, near_expiry }
    }

    /// Read a key; `None` on absence or expiry
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.lookup(key).into_value()
    }

    /// Insert or replace a value
    ///
    /// Without an explicit TTL the configured default (scaled by the TTL
    /// multiplier) applies. Priority is clamped to 1..=10.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Option<Duration>,
        priority: Option<u8>,
    ) -> CacheResult<()> {
        self.set_shared(key, Arc::new(value), ttl, priority)
    }

    pub fn set_shared(
        &self,
        key: impl Into<String>,
        value: Arc<V>,
        ttl: Option<Duration>,
        priority: Option<u8>,
    ) -> CacheResult<()> {
        let key = key.into();
        let size = key.len() + value.size_bytes();
        let now = self.clock.now();
        let mut state = self.state.lock();

        if size > state.max_memory_bytes || state.max_size == 0 {
            log::debug!(
                "rejecting key={} size={} max_memory={}",
                key,
                size,
                state.max_memory_bytes
            );
            return Err(CacheError::CapacityExceeded {
                requested: size,
                limit: state.max_memory_bytes,
            });
        }

        // Replacing an entry frees its slot before capacity is checked
        state.remove_entry(&key);
        state.ensure_capacity(size)?;

        let ttl = ttl.or_else(|| state.effective_default_ttl());
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let entry = CacheEntry::new(
            key.clone(),
            value,
            size,
            ttl,
            priority.unwrap_or(DEFAULT_PRIORITY),
            self.refresh_threshold,
            now,
            sequence,
        );

        state.memory_usage += size;
        state.entries.insert(key, entry);
        state.counters.insertions += 1;
        Ok(())
    }

    /// Remove a key; `false` when absent or already expired
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.remove_entry(key) {
            Some(entry) if entry.is_expired_at(now) => {
                state.counters.expired += 1;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired = match state.entries.get(key).map(|entry| entry.is_expired_at(now)) {
            Some(expired) => expired,
            None => return false,
        };

        if expired {
            state.remove_entry(key);
            state.counters.expired += 1;
            return false;
        }
        true
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.memory_usage = 0;
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired_keys: Vec<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired_keys {
            state.remove_entry(key);
        }
        state.counters.expired += expired_keys.len() as u64;
        expired_keys.len()
    }

    pub fn snapshot_stats(&self) -> CacheStats {
        self.state.lock().snapshot()
    }

    /// Alias of [`snapshot_stats`](Self::snapshot_stats)
    pub fn stats(&self) -> CacheStats {
        self.snapshot_stats()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.state.lock().entries.get(key).map(|entry| entry.info())
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.state.lock().policy
    }

    /// Swap the eviction policy; existing entries are kept
    pub fn set_policy(&self, policy: EvictionPolicy) {
        let mut state = self.state.lock();
        if state.policy != policy {
            log::info!("eviction policy {} -> {}", state.policy, policy);
            state.policy = policy;
        }
    }

    /// Current value of a named parameter
    pub fn parameter(&self, name: &str) -> Option<f64> {
        let state = self.state.lock();
        match name {
            PARAM_MAX_SIZE => Some(state.max_size as f64),
            PARAM_MAX_MEMORY => Some(state.max_memory_bytes as f64),
            PARAM_TTL_MULTIPLIER => Some(state.ttl_multiplier),
            PARAM_DEFAULT_TTL_SECS => {
                Some(state.default_ttl.map(|ttl| ttl.as_secs_f64()).unwrap_or(0.0))
            }
            _ => None,
        }
    }

    /// Rewrite a named parameter; shrinking a bound evicts immediately
    pub fn apply_parameter(&self, name: &str, value: f64) -> CacheResult<()> {
        if !value.is_finite() {
            return Err(CacheError::InvalidConfiguration(format!(
                "parameter {} must be finite, got {}",
                name, value
            )));
        }

        let mut state = self.state.lock();
        match name {
            PARAM_MAX_SIZE => {
                state.max_size = (value.round() as usize).max(1);
            }
            PARAM_MAX_MEMORY => {
                state.max_memory_bytes = (value.round() as usize).max(1);
            }
            PARAM_TTL_MULTIPLIER => {
                if !(MIN_TTL_MULTIPLIER..=MAX_TTL_MULTIPLIER).contains(&value) {
                    return Err(CacheError::InvalidConfiguration(format!(
                        "ttl_multiplier must be within [{}, {}], got {}",
                        MIN_TTL_MULTIPLIER, MAX_TTL_MULTIPLIER, value
                    )));
                }
                state.ttl_multiplier = value;
            }
            PARAM_DEFAULT_TTL_SECS => {
                state.default_ttl = if value <= 0.0 {
                    None
                } else {
                    let ttl = Duration::try_from_secs_f64(value)
                        .ok()
                        .filter(|ttl| *ttl <= MAX_TTL)
                        .ok_or_else(|| {
                            CacheError::InvalidConfiguration(format!(
                                "default_ttl_secs must be at most {}, got {}",
                                MAX_TTL.as_secs(),
                                value
                            ))
                        })?;
                    Some(ttl)
                };
            }
            other => {
                return Err(CacheError::InvalidConfiguration(format!(
                    "unknown store parameter '{}'",
                    other
                )));
            }
        }

        let evicted = state.shrink_to_bounds();
        if evicted > 0 {
            log::debug!("parameter {} change evicted {} entries", name, evicted);
        }
        Ok(())
    }

    /// Structural optimization hook: compacts the entry map
    pub fn optimize(&self) {
        let mut state = self.state.lock();
        state.entries.shrink_to_fit();
    }

    /// Hand the near-expiry signal stream to its single consumer
    pub fn take_refresh_receiver(&self) -> Option<mpsc::Receiver<RefreshSignal>> {
        self.refresh_rx.lock().take()
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

fn record_access_time(counters: &mut StoreCounters, started: Instant) {
    counters.access_time_total_ns += started.elapsed().as_nanos();
    counters.access_samples += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_with(config: StoreConfig) -> (CacheStore<String>, ManualClock) {
        let clock = ManualClock::starting_now();
        let store = CacheStore::with_clock(config, Arc::new(clock.clone())).unwrap();
        (store, clock)
    }

    fn small_store(max_size: usize, policy: EvictionPolicy) -> (CacheStore<String>, ManualClock) {
        store_with(StoreConfig {
            max_size,
            eviction_policy: policy,
            default_ttl: None,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_get_set_roundtrip() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        store.set("quote:1", "10.5".to_string(), None, None).unwrap();

        assert_eq!(store.get("quote:1").as_deref(), Some(&"10.5".to_string()));
        assert!(store.get("quote:2").is_none());

        let stats = store.snapshot_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_expired_entry_is_a_miss_without_sweep() {
        let (store, clock) = small_store(10, EvictionPolicy::Lru);
        store
            .set("a", "v".to_string(), Some(Duration::from_secs(1)), None)
            .unwrap();

        clock.advance(Duration::from_secs(2));
        assert!(store.get("a").is_none());

        let stats = store.snapshot_stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.memory_usage_bytes, 0);
    }

    #[test]
    fn test_lru_evicts_first_inserted_without_reads() {
        let (store, clock) = small_store(2, EvictionPolicy::Lru);
        for key in ["A", "B", "C"] {
            store.set(key, "v".to_string(), None, None).unwrap();
            clock.advance(Duration::from_millis(10));
        }

        assert!(!store.exists("A"));
        assert!(store.exists("B"));
        assert!(store.exists("C"));
        assert_eq!(store.snapshot_stats().evictions, 1);
    }

    #[test]
    fn test_lru_respects_reads() {
        let (store, clock) = small_store(2, EvictionPolicy::Lru);
        store.set("A", "v".to_string(), None, None).unwrap();
        clock.advance(Duration::from_millis(10));
        store.set("B", "v".to_string(), None, None).unwrap();
        clock.advance(Duration::from_millis(10));
        store.get("A");
        clock.advance(Duration::from_millis(10));
        store.set("C", "v".to_string(), None, None).unwrap();

        assert!(store.exists("A"));
        assert!(!store.exists("B"));
    }

    #[test]
    fn test_lfu_evicts_least_used() {
        let (store, _clock) = small_store(2, EvictionPolicy::Lfu);
        store.set("A", "v".to_string(), None, None).unwrap();
        store.set("B", "v".to_string(), None, None).unwrap();
        store.get("A");
        store.get("A");
        store.get("B");
        store.set("C", "v".to_string(), None, None).unwrap();

        assert!(store.exists("A"));
        assert!(!store.exists("B"));
        assert!(store.exists("C"));
    }

    #[test]
    fn test_ttl_policy_evicts_nearest_expiry() {
        let (store, _clock) = small_store(2, EvictionPolicy::Ttl);
        store
            .set("long", "v".to_string(), Some(Duration::from_secs(600)), None)
            .unwrap();
        store
            .set("short", "v".to_string(), Some(Duration::from_secs(5)), None)
            .unwrap();
        store
            .set("new", "v".to_string(), Some(Duration::from_secs(300)), None)
            .unwrap();

        assert!(store.exists("long"));
        assert!(!store.exists("short"));
        assert!(store.exists("new"));
    }

    #[test]
    fn test_memory_bound_is_enforced() {
        let (store, _clock) = store_with(StoreConfig {
            max_size: 100,
            max_memory_bytes: 30,
            default_ttl: None,
            ..StoreConfig::default()
        });

        for i in 0..10 {
            store.set(format!("k{}", i), "x".repeat(8), None, None).unwrap();
            let stats = store.snapshot_stats();
            assert!(stats.memory_usage_bytes <= 30);
        }
        // each entry is 2 + 8 bytes
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_oversized_entry_is_rejected() {
        let (store, _clock) = store_with(StoreConfig {
            max_memory_bytes: 16,
            default_ttl: None,
            ..StoreConfig::default()
        });
        store.set("a", "v".to_string(), None, None).unwrap();

        let result = store.set("big", "x".repeat(64), None, None);
        assert!(matches!(
            result,
            Err(CacheError::CapacityExceeded {
                requested: 67,
                limit: 16
            })
        ));
        // Rejection happens before any eviction
        assert!(store.exists("a"));
    }

    #[test]
    fn test_replacing_key_does_not_double_count_memory() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        store.set("a", "1234".to_string(), None, None).unwrap();
        store.set("a", "12".to_string(), None, None).unwrap();

        let stats = store.snapshot_stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_usage_bytes, 3);
    }

    #[test]
    fn test_delete_and_clear() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        store.set("a", "v".to_string(), None, None).unwrap();
        store.set("b", "v".to_string(), None, None).unwrap();

        assert!(store.delete("a"));
        assert!(!store.delete("a"));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.snapshot_stats().memory_usage_bytes, 0);
    }

    #[test]
    fn test_purge_expired_reclaims_unread_keys() {
        let (store, clock) = small_store(10, EvictionPolicy::Lru);
        store
            .set("a", "v".to_string(), Some(Duration::from_secs(5)), None)
            .unwrap();
        store.set("b", "v".to_string(), None, None).unwrap();

        clock.advance(Duration::from_secs(6));
        assert_eq!(store.purge_expired(), 1);

        let stats = store.snapshot_stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_near_expiry_emits_single_signal() {
        let (store, clock) = small_store(10, EvictionPolicy::Lru);
        let mut rx = store.take_refresh_receiver().unwrap();
        store
            .set("quote:1", "v".to_string(), Some(Duration::from_secs(100)), None)
            .unwrap();

        assert!(matches!(
            store.lookup("quote:1"),
            Lookup::Hit {
                near_expiry: false,
                ..
            }
        ));

        clock.advance(Duration::from_secs(95));
        assert!(matches!(
            store.lookup("quote:1"),
            Lookup::Hit {
                near_expiry: true,
                ..
            }
        ));
        store.lookup("quote:1");

        assert_eq!(
            rx.try_recv().unwrap(),
            RefreshSignal {
                key: "quote:1".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(store.snapshot_stats().refresh_signals, 1);
        assert!(store.take_refresh_receiver().is_none());
    }

    #[test]
    fn test_default_ttl_uses_multiplier() {
        let (store, clock) = store_with(StoreConfig {
            default_ttl: Some(Duration::from_secs(10)),
            ..StoreConfig::default()
        });
        store.apply_parameter(PARAM_TTL_MULTIPLIER, 2.0).unwrap();
        store.set("a", "v".to_string(), None, None).unwrap();

        clock.advance(Duration::from_secs(15));
        assert!(store.exists("a"));
        clock.advance(Duration::from_secs(6));
        assert!(!store.exists("a"));
    }

    #[test]
    fn test_out_of_range_ttl_parameters_are_rejected() {
        let (store, _clock) = store_with(StoreConfig {
            default_ttl: Some(Duration::from_secs(10)),
            ..StoreConfig::default()
        });

        assert!(matches!(
            store.apply_parameter(PARAM_DEFAULT_TTL_SECS, 1e30),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert_eq!(store.parameter(PARAM_DEFAULT_TTL_SECS), Some(10.0));

        assert!(matches!(
            store.apply_parameter(PARAM_TTL_MULTIPLIER, 1e300),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert_eq!(store.parameter(PARAM_TTL_MULTIPLIER), Some(1.0));

        store.set("k", "v".to_string(), None, None).unwrap();
        assert_eq!(
            store.entry_info("k").unwrap().ttl,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_scaled_default_ttl_is_capped() {
        let (store, _clock) = store_with(StoreConfig {
            default_ttl: Some(MAX_TTL),
            ..StoreConfig::default()
        });
        store.apply_parameter(PARAM_TTL_MULTIPLIER, MAX_TTL_MULTIPLIER).unwrap();

        store.set("k", "v".to_string(), None, None).unwrap();
        assert_eq!(store.entry_info("k").unwrap().ttl, Some(MAX_TTL));
    }

    #[test]
    fn test_shrinking_max_size_evicts() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        for i in 0..5 {
            store.set(format!("k{}", i), "v".to_string(), None, None).unwrap();
        }

        store.apply_parameter(PARAM_MAX_SIZE, 2.0).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.parameter(PARAM_MAX_SIZE), Some(2.0));
        assert!(store.apply_parameter("bogus", 1.0).is_err());
    }

    #[test]
    fn test_policy_swap_keeps_entries() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        store.set("a", "v".to_string(), None, None).unwrap();
        store.set_policy(EvictionPolicy::Lfu);

        assert_eq!(store.policy(), EvictionPolicy::Lfu);
        assert!(store.exists("a"));
    }

    #[test]
    fn test_stats_are_idempotent() {
        let (store, _clock) = small_store(10, EvictionPolicy::Lru);
        store.set("a", "v".to_string(), None, None).unwrap();
        store.get("a");
        store.get("missing");

        assert_eq!(store.snapshot_stats(), store.snapshot_stats());
    }
}
