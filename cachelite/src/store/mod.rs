// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded key/value storage
//!
//! This module provides the cache storage engine:
//! - Per-entry TTL with lazy and swept expiry
//! - Entry-count and memory bounds enforced by a swappable eviction policy
//! - Near-expiry refresh signals for the preload scheduler
//! - A single statistics snapshot consumed by the adaptive strategy

pub mod cache_store;
pub mod entry;
pub mod eviction;
pub mod stats;
pub mod store_config;

pub use cache_store::{CacheStore, Lookup, RefreshSignal};
pub use entry::{CacheEntry, EntryInfo};
pub use stats::CacheStats;
pub use store_config::{EvictionPolicy, StoreConfig};

/// Cached value trait
pub trait CacheValue: std::fmt::Debug + Send + Sync + 'static {
    /// Approximate heap footprint of the value
    fn size_bytes(&self) -> usize;
}

impl CacheValue for String {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl CacheValue for Vec<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl CacheValue for serde_json::Value {
    fn size_bytes(&self) -> usize {
        json_size(self)
    }
}

fn json_size(value: &serde_json::Value) -> usize {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(json_size).sum::<usize>() + items.len(),
        Value::Object(map) => map.iter().map(|(k, v)| k.len() + json_size(v)).sum(),
    }
}
