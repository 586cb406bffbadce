// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Adaptation rules and strategy modes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::clock::elapsed_between;
use crate::error::CacheError;
use crate::store::cache_store::PARAM_MAX_SIZE;

/// Default rule names
pub const RULE_LOW_HIT_RATE: &str = "low_hit_rate";
pub const RULE_HIGH_MEMORY_USAGE: &str = "high_memory_usage";
pub const RULE_SLOW_ACCESS: &str = "slow_access";
pub const RULE_HIGH_EVICTION_RATE: &str = "high_eviction_rate";

/// Parameter name recorded for structural optimization passes
pub const PARAM_STRUCTURE: &str = "structure";

/// Observed store metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HitRate,
    /// Memory usage over the memory bound
    MemoryUsage,
    /// Mean `get` latency in milliseconds
    AccessTime,
    /// Evictions per request since the previous evaluation
    EvictionRate,
}

impl MetricKind {
    pub fn higher_is_better(&self) -> bool {
        matches!(self, MetricKind::HitRate)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::HitRate => write!(f, "hit_rate"),
            MetricKind::MemoryUsage => write!(f, "memory_usage"),
            MetricKind::AccessTime => write!(f, "access_time"),
            MetricKind::EvictionRate => write!(f, "eviction_rate"),
        }
    }
}

/// What a triggered rule does to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    IncreaseCapacity,
    DecreaseCapacity,
    /// Structural optimization hook
    Optimize,
}

/// Bundle of default adjustment factor, maximum adjustment and cooldown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl StrategyMode {
    /// (adjustment_factor, max_adjustment, cooldown)
    pub fn defaults(&self) -> (f64, f64, Duration) {
        match self {
            StrategyMode::Conservative => (0.1, 0.2, Duration::from_secs(600)),
            StrategyMode::Balanced => (0.2, 0.5, Duration::from_secs(300)),
            StrategyMode::Aggressive => (0.3, 1.0, Duration::from_secs(120)),
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyMode::Conservative => write!(f, "conservative"),
            StrategyMode::Balanced => write!(f, "balanced"),
            StrategyMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for StrategyMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(StrategyMode::Conservative),
            "balanced" => Ok(StrategyMode::Balanced),
            "aggressive" => Ok(StrategyMode::Aggressive),
            other => Err(CacheError::InvalidConfiguration(format!(
                "unknown strategy mode '{}'",
                other
            ))),
        }
    }
}

/// Threshold rule mapping a metric to a store adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationRule {
    pub name: String,
    pub metric: MetricKind,
    /// Fires when the metric drops below this value
    pub low_threshold: Option<f64>,
    /// Fires when the metric rises above this value
    pub high_threshold: Option<f64>,
    pub action: RuleAction,
    /// Store parameter the rule rewrites
    pub parameter: String,
    pub adjustment_factor: f64,
    /// Upper bound on the relative change of one application
    pub max_adjustment: f64,
    pub cooldown: Duration,
    #[serde(skip)]
    pub last_applied: Option<DateTime<Utc>>,
    pub enabled: bool,
    /// Added by the user rather than derived from the mode
    #[serde(default)]
    pub custom: bool,
}

impl AdaptationRule {
    pub fn new(name: impl Into<String>, metric: MetricKind, action: RuleAction, mode: StrategyMode) -> Self {
        let (adjustment_factor, max_adjustment, cooldown) = mode.defaults();
        Self {
            name: name.into(),
            metric,
            low_threshold: None,
            high_threshold: None,
            action,
            parameter: PARAM_MAX_SIZE.to_string(),
            adjustment_factor,
            max_adjustment,
            cooldown,
            last_applied: None,
            enabled: true,
            custom: false,
        }
    }

    pub fn below(mut self, threshold: f64) -> Self {
        self.low_threshold = Some(threshold);
        self
    }

    pub fn above(mut self, threshold: f64) -> Self {
        self.high_threshold = Some(threshold);
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = parameter.into();
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn is_triggered(&self, value: f64) -> bool {
        self.low_threshold.is_some_and(|low| value < low)
            || self.high_threshold.is_some_and(|high| value > high)
    }

    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.last_applied {
            Some(last) => self.cooldown.saturating_sub(elapsed_between(last, now)),
            None => Duration::ZERO,
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        !self.cooldown_remaining(now).is_zero()
    }

    /// Relative change for a triggering value
    ///
    /// The factor grows with the distance past the threshold and is capped
    /// at `max_adjustment`.
    pub fn change_fraction(&self, value: f64) -> f64 {
        let severity = match (self.low_threshold, self.high_threshold) {
            (Some(low), _) if value < low && low > 0.0 => (low - value) / low,
            (_, Some(high)) if value > high && high > 0.0 => (value - high) / high,
            _ => 0.0,
        };
        (self.adjustment_factor * (1.0 + severity)).min(self.max_adjustment)
    }
}

/// The four built-in rules for a mode
pub fn default_rules(mode: StrategyMode) -> Vec<AdaptationRule> {
    vec![
        AdaptationRule::new(RULE_LOW_HIT_RATE, MetricKind::HitRate, RuleAction::IncreaseCapacity, mode)
            .below(0.7),
        AdaptationRule::new(
            RULE_HIGH_MEMORY_USAGE,
            MetricKind::MemoryUsage,
            RuleAction::DecreaseCapacity,
            mode,
        )
        .above(0.9),
        AdaptationRule::new(RULE_SLOW_ACCESS, MetricKind::AccessTime, RuleAction::Optimize, mode)
            .above(10.0)
            .with_parameter(PARAM_STRUCTURE),
        AdaptationRule::new(
            RULE_HIGH_EVICTION_RATE,
            MetricKind::EvictionRate,
            RuleAction::IncreaseCapacity,
            mode,
        )
        .above(0.1),
    ]
}

/// Threshold override for a built-in rule, keyed by rule name in config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleOverride {
    pub low_threshold: Option<f64>,
    pub high_threshold: Option<f64>,
    pub cooldown: Option<Duration>,
    pub enabled: Option<bool>,
}

impl RuleOverride {
    pub fn apply_to(&self, rule: &mut AdaptationRule) {
        if let Some(low) = self.low_threshold {
            rule.low_threshold = Some(low);
        }
        if let Some(high) = self.high_threshold {
            rule.high_threshold = Some(high);
        }
        if let Some(cooldown) = self.cooldown {
            rule.cooldown = cooldown;
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
    }
}
