// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine-wide configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adaptive::{StrategyConfig, StrategyMode};
use crate::analyzer::AnalyzerConfig;
use crate::error::CacheResult;
use crate::preload::SchedulerConfig;
use crate::store::StoreConfig;

/// Configuration for every engine component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub analyzer: AnalyzerConfig,
    pub scheduler: SchedulerConfig,
    pub strategy: StrategyConfig,
}

impl EngineConfig {
    /// Large capacity, eager prefetching and aggressive tuning
    pub fn read_optimized() -> Self {
        let mut config = Self::default();
        config.store.max_size = 50_000;
        config.store.max_memory_bytes = 1024 * 1024 * 1024; // 1GB
        config.scheduler.concurrency_limit = 6;
        config.scheduler.demand_poll_interval = Duration::from_secs(15);
        config.scheduler.demand_top_n = 10;
        config.strategy.mode = StrategyMode::Aggressive;
        config
    }

    /// Small bounds, one loader at a time and conservative tuning
    pub fn memory_constrained() -> Self {
        let mut config = Self {
            store: StoreConfig::memory_constrained(),
            ..Self::default()
        };
        config.analyzer.max_events = 50;
        config.scheduler.concurrency_limit = 1;
        config.scheduler.queue_capacity = 16;
        config.strategy.mode = StrategyMode::Conservative;
        config.strategy.max_capacity = config.store.max_size * 2;
        config
    }

    pub fn validate(&self) -> CacheResult<()> {
        self.store.validate()?;
        self.analyzer.validate()?;
        self.scheduler.validate()?;
        self.strategy.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json_str(json: &str) -> CacheResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> CacheResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::store::EvictionPolicy;

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::read_optimized().validate().is_ok());
        assert!(EngineConfig::memory_constrained().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"store": {"max_size": 42, "eviction_policy": "lfu"}, "strategy": {"mode": "aggressive"}}"#,
        )
        .unwrap();

        assert_eq!(config.store.max_size, 42);
        assert_eq!(config.store.eviction_policy, EvictionPolicy::Lfu);
        assert_eq!(config.store.refresh_threshold, 0.1);
        assert_eq!(config.strategy.mode, StrategyMode::Aggressive);
        assert_eq!(config.scheduler.concurrency_limit, 3);
    }

    #[test]
    fn test_json_roundtrip() {
        let original = EngineConfig::memory_constrained();
        let parsed = EngineConfig::from_json_str(&original.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed.store.max_size, original.store.max_size);
        assert_eq!(parsed.strategy.mode, StrategyMode::Conservative);
    }

    #[test]
    fn test_invalid_json_is_a_configuration_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"store": {"max_size": 0}}"#),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }
}
