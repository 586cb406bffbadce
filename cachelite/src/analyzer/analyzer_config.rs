// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Access pattern analysis configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Thresholds deciding whether a pattern warrants a prefetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadThresholds {
    /// Predicted access must fall within this window of "now"
    pub near_term_window: Duration,
    /// Minimum prediction confidence for the near-term condition
    pub min_confidence: f64,
    /// Velocity floor (events/minute) for the popularizing condition
    pub min_velocity: f64,
    /// Trend floor for the popularizing condition
    pub min_trend: f64,
}

impl Default for PreloadThresholds {
    fn default() -> Self {
        Self {
            near_term_window: Duration::from_secs(300), // 5 minutes
            min_confidence: 0.6,
            min_velocity: 2.0,
            min_trend: 0.2,
        }
    }
}

/// Analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum retained events per pattern
    pub max_events: usize,
    /// Maximum age of retained events
    pub max_window: Duration,
    /// Accesses a key needs before it is never pruned
    pub popularity_threshold: u64,
    /// Unpopular patterns idle longer than this are pruned
    pub retention: Duration,
    /// Bulk analysis loop interval
    pub analysis_interval: Duration,
    pub thresholds: PreloadThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            max_window: Duration::from_secs(24 * 3600), // 24 hours
            popularity_threshold: 5,
            retention: Duration::from_secs(2 * 3600), // 2 hours
            analysis_interval: Duration::from_secs(30),
            thresholds: PreloadThresholds::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_events < 2 {
            return Err(CacheError::InvalidConfiguration(
                "analyzer max_events must be >= 2".to_string(),
            ));
        }

        if self.analysis_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "analysis_interval must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.thresholds.min_confidence) {
            return Err(CacheError::InvalidConfiguration(format!(
                "min_confidence must be within [0, 1], got {}",
                self.thresholds.min_confidence
            )));
        }

        Ok(())
    }
}
