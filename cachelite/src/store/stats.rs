// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store statistics

use serde::{Deserialize, Serialize};

/// Point-in-time statistics snapshot
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    pub insertions: u64,
    pub memory_usage_bytes: usize,
    pub entry_count: usize,
    pub hit_rate: f64,
    pub max_size: usize,
    pub max_memory_bytes: usize,
    /// Mean wall time spent inside `get`, in milliseconds
    pub average_access_time_ms: f64,
    pub refresh_signals: u64,
    pub dropped_refresh_signals: u64,
}

impl CacheStats {
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn memory_usage_ratio(&self) -> f64 {
        if self.max_memory_bytes == 0 {
            0.0
        } else {
            self.memory_usage_bytes as f64 / self.max_memory_bytes as f64
        }
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.entry_count as f64 / self.max_size as f64
        }
    }
}

/// Raw counters kept under the store lock
#[derive(Debug, Default, Clone)]
pub(crate) struct StoreCounters {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    pub insertions: u64,
    pub access_time_total_ns: u128,
    pub access_samples: u64,
    pub refresh_signals: u64,
    pub dropped_refresh_signals: u64,
}

impl StoreCounters {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn average_access_time_ms(&self) -> f64 {
        if self.access_samples == 0 {
            0.0
        } else {
            (self.access_time_total_ns as f64 / self.access_samples as f64) / 1_000_000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_without_requests() {
        assert_eq!(StoreCounters::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_ratios() {
        let stats = CacheStats {
            memory_usage_bytes: 512,
            max_memory_bytes: 1024,
            entry_count: 3,
            max_size: 4,
            ..CacheStats::default()
        };
        assert_eq!(stats.memory_usage_ratio(), 0.5);
        assert_eq!(stats.fill_ratio(), 0.75);
    }
}
