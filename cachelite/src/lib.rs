// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CacheLite - A self-tuning predictive in-process cache
//!
//! CacheLite keeps hot data in memory, learns how it is read, fetches it
//! before it is asked for and retunes itself from its own statistics.
//!
//! # Components
//!
//! - **Cache store**: bounded key/value storage with TTL expiry and LRU, LFU
//!   or nearest-expiry eviction
//! - **Access pattern analyzer**: per-key interval, velocity, trend and
//!   seasonality statistics with next-access prediction
//! - **Preload scheduler**: startup, periodic and demand-driven loaders run on
//!   a bounded worker pool
//! - **Adaptive strategy**: threshold rules that adjust store parameters with
//!   cooldowns, a rate limit and an audit trail
//!
//! # Usage
//!
//! ```ignore
//! use cachelite::{EngineConfig, PredictiveCache};
//!
//! let cache: PredictiveCache<String> = PredictiveCache::new(EngineConfig::default())?;
//! cache.start();
//! cache.set("quote:AAPL", "189.20".to_string(), None, None)?;
//! let value = cache.get("quote:AAPL");
//! cache.stop().await;
//! ```

pub mod adaptive;
pub mod analyzer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod preload;
pub mod store;

pub(crate) mod background;

pub use adaptive::{
    AdaptationRule, AdaptiveCacheStrategy, CacheAdjustment, StrategyConfig, StrategyMode,
    StrategyStatus, TunableCache,
};
pub use analyzer::{AccessPattern, AccessPatternAnalyzer, AnalyzerConfig};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{EngineSnapshot, PredictiveCache};
pub use error::{CacheError, CacheResult};
pub use preload::{LoadedItem, Loader, PreloadScheduler, SchedulerConfig, SchedulerStats, TaskSpec};
pub use store::{CacheStats, CacheStore, CacheValue, EvictionPolicy, Lookup, StoreConfig};

/// CacheLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
