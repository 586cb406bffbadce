// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Self-tuning of cache parameters
//!
//! The strategy periodically reads store statistics, evaluates threshold
//! rules against them and rewrites store parameters by name. Adjustments are
//! rate limited, recorded in a bounded history and scored for effectiveness
//! once the store has had time to react.

pub mod rules;
pub mod strategy;
pub mod strategy_config;

pub use rules::{
    default_rules, AdaptationRule, MetricKind, RuleAction, RuleOverride, StrategyMode,
};
pub use strategy::{AdaptiveCacheStrategy, CacheAdjustment, RuleStatus, StrategyStatus};
pub use strategy_config::StrategyConfig;

use crate::error::CacheResult;
use crate::store::{CacheStats, CacheStore, CacheValue};

/// The store surface the strategy observes and tunes
pub trait TunableCache: Send + Sync {
    fn snapshot_stats(&self) -> CacheStats;

    fn parameter(&self, name: &str) -> Option<f64>;

    fn apply_parameter(&self, name: &str, value: f64) -> CacheResult<()>;

    /// Structural optimization pass
    fn optimize(&self);
}

impl<V: CacheValue> TunableCache for CacheStore<V> {
    fn snapshot_stats(&self) -> CacheStats {
        CacheStore::snapshot_stats(self)
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        CacheStore::parameter(self, name)
    }

    fn apply_parameter(&self, name: &str, value: f64) -> CacheResult<()> {
        CacheStore::apply_parameter(self, name, value)
    }

    fn optimize(&self) {
        CacheStore::optimize(self)
    }
}
