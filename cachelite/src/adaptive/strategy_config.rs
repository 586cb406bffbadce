// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Adaptive strategy configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{RuleOverride, StrategyMode};
use crate::error::{CacheError, CacheResult};

/// Adaptive strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub mode: StrategyMode,
    pub evaluation_interval: Duration,
    /// Applied adjustments allowed in any rolling hour
    pub max_adjustments_per_hour: usize,
    /// EMA smoothing factor for metric baselines
    pub baseline_smoothing: f64,
    /// Delay before an adjustment's effect is scored
    pub effectiveness_delay: Duration,
    /// Adjustment records kept in history
    pub history_capacity: usize,
    /// Bounds for capacity adjustments
    pub min_capacity: usize,
    pub max_capacity: usize,
    /// Threshold overrides for built-in rules, by rule name
    #[serde(default)]
    pub rule_overrides: HashMap<String, RuleOverride>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: StrategyMode::Balanced,
            evaluation_interval: Duration::from_secs(60),
            max_adjustments_per_hour: 10,
            baseline_smoothing: 0.1,
            effectiveness_delay: Duration::from_secs(300), // 5 minutes
            history_capacity: 1000,
            min_capacity: 16,
            max_capacity: 10_000_000,
            rule_overrides: HashMap::new(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.evaluation_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "evaluation_interval must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.baseline_smoothing) || self.baseline_smoothing == 0.0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "baseline_smoothing must be within (0, 1], got {}",
                self.baseline_smoothing
            )));
        }

        if self.min_capacity == 0 || self.min_capacity > self.max_capacity {
            return Err(CacheError::InvalidConfiguration(format!(
                "invalid capacity bounds [{}, {}]",
                self.min_capacity, self.max_capacity
            )));
        }

        if self.history_capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "history_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
