// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Preload scheduler configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Preload scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Simultaneous loader executions
    pub concurrency_limit: usize,
    /// Pending load requests before new ones are dropped
    pub queue_capacity: usize,
    /// Budget for one loader call
    pub task_timeout: Duration,
    pub demand_poll_interval: Duration,
    pub periodic_check_interval: Duration,
    /// Demand tasks executed per poll
    pub demand_top_n: usize,
    /// Floor for the per-key demand re-trigger interval
    pub min_retrigger_interval: Duration,
    /// EMA smoothing factor for the items-per-second performance score
    pub performance_smoothing: f64,
    /// Interval changes smaller than this are ignored
    pub interval_hysteresis: Duration,
    pub min_task_interval: Duration,
    pub max_task_interval: Duration,
    /// Items per second above which a periodic task is a high performer
    pub high_performance_score: f64,
    /// Items per second below which a periodic task is a poor performer
    pub low_performance_score: f64,
    /// Safety bound on startup dependency resolution rounds
    pub startup_max_iterations: usize,
    /// TTL for loaded items that carry none, by data type
    pub data_type_ttls: HashMap<String, Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut data_type_ttls = HashMap::new();
        data_type_ttls.insert("quote".to_string(), Duration::from_secs(60));
        data_type_ttls.insert("list".to_string(), Duration::from_secs(3600));
        data_type_ttls.insert("schedule".to_string(), Duration::from_secs(24 * 3600));

        Self {
            concurrency_limit: 3,
            queue_capacity: 64,
            task_timeout: Duration::from_secs(30),
            demand_poll_interval: Duration::from_secs(30),
            periodic_check_interval: Duration::from_secs(10),
            demand_top_n: 5,
            min_retrigger_interval: Duration::from_secs(30),
            performance_smoothing: 0.3,
            interval_hysteresis: Duration::from_secs(30),
            min_task_interval: Duration::from_secs(30),
            max_task_interval: Duration::from_secs(3600),
            high_performance_score: 10.0,
            low_performance_score: 1.0,
            startup_max_iterations: 100,
            data_type_ttls,
        }
    }
}

impl SchedulerConfig {
    pub fn ttl_for(&self, data_type: &str) -> Option<Duration> {
        self.data_type_ttls.get(data_type).copied()
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.concurrency_limit == 0 {
            return Err(CacheError::InvalidConfiguration(
                "concurrency_limit must be > 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "queue_capacity must be > 0".to_string(),
            ));
        }

        if self.task_timeout.is_zero()
            || self.demand_poll_interval.is_zero()
            || self.periodic_check_interval.is_zero()
        {
            return Err(CacheError::InvalidConfiguration(
                "scheduler timeout and poll intervals must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.performance_smoothing) || self.performance_smoothing == 0.0
        {
            return Err(CacheError::InvalidConfiguration(format!(
                "performance_smoothing must be within (0, 1], got {}",
                self.performance_smoothing
            )));
        }

        if self.min_task_interval > self.max_task_interval {
            return Err(CacheError::InvalidConfiguration(
                "min_task_interval exceeds max_task_interval".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.ttl_for("quote"), Some(Duration::from_secs(60)));
        assert_eq!(config.ttl_for("unknown"), None);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = SchedulerConfig {
            concurrency_limit: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }
}
