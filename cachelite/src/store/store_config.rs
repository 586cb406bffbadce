// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store configuration and eviction policies

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Range accepted for the default-TTL multiplier
pub const MIN_TTL_MULTIPLIER: f64 = 0.01;
pub const MAX_TTL_MULTIPLIER: f64 = 1000.0;

/// Longest TTL the store derives from its defaults (one year)
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entries
    pub max_size: usize,

    /// Maximum aggregate size of all entries (bytes)
    pub max_memory_bytes: usize,

    /// TTL applied when `set` is called without one
    pub default_ttl: Option<Duration>,

    /// Multiplier applied to the default TTL
    pub ttl_multiplier: f64,

    /// Eviction policy used when a bound is exceeded
    pub eviction_policy: EvictionPolicy,

    /// Remaining-TTL fraction below which a hit signals "near expiry"
    pub refresh_threshold: f64,

    /// Background expiry sweep interval
    pub sweep_interval: Duration,

    /// Capacity of the near-expiry signal channel
    pub refresh_signal_capacity: usize,
}

/// Eviction policies for when the store is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least Recently Used
    Lru,
    /// Least Frequently Used
    Lfu,
    /// Nearest expiry first
    Ttl,
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionPolicy::Lru => write!(f, "lru"),
            EvictionPolicy::Lfu => write!(f, "lfu"),
            EvictionPolicy::Ttl => write!(f, "ttl"),
        }
    }
}

impl std::str::FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "ttl" => Ok(EvictionPolicy::Ttl),
            other => Err(CacheError::InvalidConfiguration(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            max_memory_bytes: 1024 * 1024 * 256, // 256MB
            default_ttl: Some(Duration::from_secs(300)), // 5 minutes
            ttl_multiplier: 1.0,
            eviction_policy: EvictionPolicy::Lru,
            refresh_threshold: 0.1,
            sweep_interval: Duration::from_secs(60),
            refresh_signal_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Configuration for memory-constrained processes
    pub fn memory_constrained() -> Self {
        Self {
            max_size: 2_000,
            max_memory_bytes: 1024 * 1024 * 32, // 32MB
            eviction_policy: EvictionPolicy::Lfu,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfiguration(
                "store max_size must be > 0".to_string(),
            ));
        }

        if self.max_memory_bytes == 0 {
            return Err(CacheError::InvalidConfiguration(
                "store max_memory_bytes must be > 0".to_string(),
            ));
        }

        if !(MIN_TTL_MULTIPLIER..=MAX_TTL_MULTIPLIER).contains(&self.ttl_multiplier) {
            return Err(CacheError::InvalidConfiguration(format!(
                "ttl_multiplier must be within [{}, {}], got {}",
                MIN_TTL_MULTIPLIER, MAX_TTL_MULTIPLIER, self.ttl_multiplier
            )));
        }

        if !(0.0..=1.0).contains(&self.refresh_threshold) {
            return Err(CacheError::InvalidConfiguration(format!(
                "refresh_threshold must be within [0, 1], got {}",
                self.refresh_threshold
            )));
        }

        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "sweep_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
