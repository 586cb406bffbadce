// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Concurrent registry of key and data-type access patterns

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use super::{AccessPattern, AnalyzerConfig};
use crate::clock::{system_clock, SharedClock};
use crate::error::CacheResult;

type PatternMap = RwLock<HashMap<String, Arc<Mutex<AccessPattern>>>>;

/// A key the analyzer expects to be read soon
#[derive(Debug, Clone, Serialize)]
pub struct PreloadCandidate {
    pub key: String,
    pub data_type: String,
    pub priority_score: f64,
    pub confidence: f64,
    pub velocity: f64,
    pub trend: f64,
    pub average_interval: Option<Duration>,
    pub next_predicted_access: Option<DateTime<Utc>>,
}

/// Result of one bulk analysis pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub tracked_keys: usize,
    pub tracked_types: usize,
    pub pruned: usize,
    pub preload_candidates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzerStats {
    pub tracked_keys: usize,
    pub tracked_types: usize,
    pub total_recorded: u64,
    pub total_pruned: u64,
}

/// Learns per-key and per-type access patterns
///
/// Each pattern sits behind its own mutex, so concurrent `record_access`
/// calls for different keys never contend beyond the brief map lookup.
pub struct AccessPatternAnalyzer {
    config: AnalyzerConfig,
    clock: SharedClock,
    key_patterns: PatternMap,
    type_patterns: PatternMap,
    total_recorded: AtomicU64,
    total_pruned: AtomicU64,
}

impl AccessPatternAnalyzer {
    pub fn new(config: AnalyzerConfig) -> CacheResult<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: AnalyzerConfig, clock: SharedClock) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            key_patterns: RwLock::new(HashMap::new()),
            type_patterns: RwLock::new(HashMap::new()),
            total_recorded: AtomicU64::new(0),
            total_pruned: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Record a read of `key`, updating both its key and type patterns
    pub fn record_access(&self, key: &str, data_type: &str, timestamp: Option<DateTime<Utc>>) {
        let at = timestamp.unwrap_or_else(|| self.clock.now());

        self.record_into(&self.key_patterns, key, Some(data_type), at);
        self.record_into(&self.type_patterns, data_type, None, at);

        self.total_recorded.fetch_add(1, AtomicOrdering::Relaxed);
    }

    // The map guard is held while recording so a concurrent prune cannot
    // detach the pattern between lookup and update
    fn record_into(&self, map: &PatternMap, id: &str, data_type: Option<&str>, at: DateTime<Utc>) {
        let (max_events, max_window) = (self.config.max_events, self.config.max_window);

        if let Some(existing) = map.read().get(id) {
            existing.lock().record(at, max_events, max_window);
            return;
        }

        let mut patterns = map.write();
        patterns
            .entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AccessPattern::new(
                    id,
                    data_type.map(str::to_string),
                    at,
                )))
            })
            .lock()
            .record(at, max_events, max_window);
    }

    /// Snapshot of a key's pattern
    pub fn pattern(&self, key: &str) -> Option<AccessPattern> {
        self.key_patterns
            .read()
            .get(key)
            .map(|pattern| pattern.lock().clone())
    }

    pub fn type_pattern(&self, data_type: &str) -> Option<AccessPattern> {
        self.type_patterns
            .read()
            .get(data_type)
            .map(|pattern| pattern.lock().clone())
    }

    pub fn should_preload(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.key_patterns
            .read()
            .get(key)
            .is_some_and(|pattern| pattern.lock().should_preload(now, &self.config.thresholds))
    }

    /// Keys worth prefetching at `now`, best first
    pub fn preload_candidates(&self, now: DateTime<Utc>, limit: usize) -> Vec<PreloadCandidate> {
        let mut candidates: Vec<PreloadCandidate> = self
            .pattern_handles(&self.key_patterns)
            .into_iter()
            .filter_map(|handle| {
                let pattern = handle.lock();
                if !pattern.should_preload(now, &self.config.thresholds) {
                    return None;
                }
                Some(PreloadCandidate {
                    key: pattern.id.clone(),
                    data_type: pattern.data_type.clone().unwrap_or_default(),
                    priority_score: pattern.priority_score(),
                    confidence: pattern.prediction_confidence,
                    velocity: pattern.access_velocity,
                    trend: pattern.trend_score,
                    average_interval: pattern.average_interval,
                    next_predicted_access: pattern.next_predicted_access,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Most active keys by velocity
    pub fn top_keys(&self, n: usize) -> Vec<AccessPattern> {
        let mut patterns: Vec<AccessPattern> = self
            .pattern_handles(&self.key_patterns)
            .into_iter()
            .map(|handle| handle.lock().clone())
            .collect();

        patterns.sort_by(|a, b| {
            b.access_velocity
                .partial_cmp(&a.access_velocity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.access_count.cmp(&a.access_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        patterns.truncate(n);
        patterns
    }

    // Clone the handles out so long scans do not hold the map lock
    fn pattern_handles(&self, map: &PatternMap) -> Vec<Arc<Mutex<AccessPattern>>> {
        map.read().values().cloned().collect()
    }

    /// Drop stale patterns from both maps
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let pruned = self.prune_map(&self.key_patterns, now) + self.prune_map(&self.type_patterns, now);
        if pruned > 0 {
            self.total_pruned.fetch_add(pruned as u64, AtomicOrdering::Relaxed);
            log::debug!("pruned {} stale access patterns", pruned);
        }
        pruned
    }

    fn prune_map(&self, map: &PatternMap, now: DateTime<Utc>) -> usize {
        let mut patterns = map.write();
        let before = patterns.len();
        patterns.retain(|_, pattern| {
            !pattern.lock().is_stale(
                now,
                self.config.popularity_threshold,
                self.config.retention,
            )
        });
        before - patterns.len()
    }

    /// Bulk pass run by the analysis loop
    pub fn analyze(&self, now: DateTime<Utc>) -> AnalysisReport {
        let pruned = self.prune(now);
        let preload_candidates = self.preload_candidates(now, usize::MAX).len();

        AnalysisReport {
            tracked_keys: self.key_patterns.read().len(),
            tracked_types: self.type_patterns.read().len(),
            pruned,
            preload_candidates,
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.key_patterns.read().len()
    }

    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            tracked_keys: self.key_patterns.read().len(),
            tracked_types: self.type_patterns.read().len(),
            total_recorded: self.total_recorded.load(AtomicOrdering::Relaxed),
            total_pruned: self.total_pruned.load(AtomicOrdering::Relaxed),
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}
