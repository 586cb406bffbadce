// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Preload task definitions and per-task execution bookkeeping

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{Loader, SchedulerConfig};
use crate::clock::elapsed_between;
use crate::error::{CacheError, CacheResult};

pub const MIN_TASK_PRIORITY: u8 = 1;
pub const MAX_TASK_PRIORITY: u8 = 10;

/// When a task fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Once, when the scheduler starts
    Startup,
    /// Every `interval`, adjusted by the interval optimizer
    Periodic,
    /// When the analyzer predicts demand for a matching key
    Demand,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Startup => write!(f, "startup"),
            ScheduleKind::Periodic => write!(f, "periodic"),
            ScheduleKind::Demand => write!(f, "demand"),
        }
    }
}

/// Registration request for a preload task
pub struct TaskSpec<V> {
    pub data_type: String,
    /// Glob over keys; `*` matches any run of characters, `?` one character
    pub key_pattern: String,
    pub loader: Arc<dyn Loader<V>>,
    pub priority: u8,
    pub schedule: ScheduleKind,
    pub interval: Option<Duration>,
    pub dependencies: Vec<String>,
}

impl<V> TaskSpec<V> {
    fn new(data_type: impl Into<String>, loader: Arc<dyn Loader<V>>, schedule: ScheduleKind) -> Self {
        let data_type = data_type.into();
        Self {
            key_pattern: format!("{}:*", data_type),
            data_type,
            loader,
            priority: 5,
            schedule,
            interval: None,
            dependencies: Vec::new(),
        }
    }

    pub fn startup(data_type: impl Into<String>, loader: Arc<dyn Loader<V>>) -> Self {
        Self::new(data_type, loader, ScheduleKind::Startup)
    }

    pub fn periodic(
        data_type: impl Into<String>,
        loader: Arc<dyn Loader<V>>,
        interval: Duration,
    ) -> Self {
        let mut spec = Self::new(data_type, loader, ScheduleKind::Periodic);
        spec.interval = Some(interval);
        spec
    }

    pub fn demand(data_type: impl Into<String>, loader: Arc<dyn Loader<V>>) -> Self {
        Self::new(data_type, loader, ScheduleKind::Demand)
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_key_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.key_pattern = pattern.into();
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }
}

/// Compile a key glob into an anchored regex
pub fn compile_key_pattern(pattern: &str) -> CacheResult<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Ok(Regex::new(&format!("^{}$", escaped))?)
}

/// A registered preload task
pub struct PreloadTask<V> {
    pub id: String,
    pub data_type: String,
    pub key_pattern: String,
    matcher: Regex,
    pub loader: Arc<dyn Loader<V>>,
    pub priority: u8,
    pub schedule: ScheduleKind,
    pub interval: Option<Duration>,
    pub dependencies: Vec<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub items_loaded: u64,
    /// Current periodic interval after optimizer adjustments
    pub adaptive_interval: Option<Duration>,
    /// EMA of items loaded per second
    pub performance_score: f64,
    pub last_duration: Option<Duration>,
    pub last_error: Option<String>,
    /// Created by the scheduler from a registered loader
    pub dynamic: bool,
}

impl<V> PreloadTask<V> {
    /// Validate a spec and build the task
    pub fn from_spec(id: impl Into<String>, spec: TaskSpec<V>) -> CacheResult<Self> {
        let id = id.into();

        if !(MIN_TASK_PRIORITY..=MAX_TASK_PRIORITY).contains(&spec.priority) {
            return Err(CacheError::InvalidPolicyTransition(format!(
                "task {} priority {} outside {}..={}",
                id, spec.priority, MIN_TASK_PRIORITY, MAX_TASK_PRIORITY
            )));
        }

        let interval = match (spec.schedule, spec.interval) {
            (ScheduleKind::Periodic, None) => {
                return Err(CacheError::InvalidPolicyTransition(format!(
                    "periodic task {} has no interval",
                    id
                )));
            }
            (ScheduleKind::Periodic, Some(interval)) if interval.is_zero() => {
                return Err(CacheError::InvalidPolicyTransition(format!(
                    "periodic task {} has a zero interval",
                    id
                )));
            }
            (_, interval) => interval,
        };

        let matcher = compile_key_pattern(&spec.key_pattern)?;

        Ok(Self {
            id,
            data_type: spec.data_type,
            key_pattern: spec.key_pattern,
            matcher,
            loader: spec.loader,
            priority: spec.priority,
            schedule: spec.schedule,
            interval,
            dependencies: spec.dependencies,
            last_run: None,
            success_count: 0,
            failure_count: 0,
            items_loaded: 0,
            adaptive_interval: interval,
            performance_score: 0.0,
            last_duration: None,
            last_error: None,
            dynamic: false,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    pub fn runs(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub fn success_rate(&self) -> f64 {
        match self.runs() {
            0 => 0.0,
            runs => self.success_count as f64 / runs as f64,
        }
    }

    /// Periodic task whose adaptive interval has elapsed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.schedule != ScheduleKind::Periodic {
            return false;
        }
        match (self.last_run, self.adaptive_interval) {
            (None, _) => true,
            (Some(last), Some(interval)) => elapsed_between(last, now) >= interval,
            (Some(_), None) => false,
        }
    }

    /// Ran more recently than `floor`
    pub fn ran_within(&self, now: DateTime<Utc>, floor: Duration) -> bool {
        self.last_run
            .is_some_and(|last| elapsed_between(last, now) < floor)
    }

    pub fn record_success(&mut self, items: usize, elapsed: Duration, now: DateTime<Utc>, alpha: f64) {
        self.last_run = Some(now);
        self.last_duration = Some(elapsed);
        self.success_count += 1;
        self.items_loaded += items as u64;
        self.last_error = None;

        let rate = items as f64 / elapsed.as_secs_f64().max(0.001);
        self.update_performance(rate, alpha);
    }

    pub fn record_failure(&mut self, error: &CacheError, elapsed: Duration, now: DateTime<Utc>, alpha: f64) {
        self.last_run = Some(now);
        self.last_duration = Some(elapsed);
        self.failure_count += 1;
        self.last_error = Some(error.to_string());
        self.update_performance(0.0, alpha);
    }

    fn update_performance(&mut self, rate: f64, alpha: f64) {
        self.performance_score = if self.runs() <= 1 {
            rate
        } else {
            alpha * rate + (1.0 - alpha) * self.performance_score
        };
    }

    /// Shorten the interval of strong periodic tasks, lengthen it for weak ones
    ///
    /// Returns the old and new interval when a change was applied.
    pub fn optimize_interval(&mut self, config: &SchedulerConfig) -> Option<(Duration, Duration)> {
        if self.schedule != ScheduleKind::Periodic || self.runs() < 3 {
            return None;
        }
        let current = self.adaptive_interval?;
        let success_rate = self.success_rate();

        let factor = if self.performance_score >= config.high_performance_score && success_rate >= 0.9 {
            0.8
        } else if success_rate < 0.5 || self.performance_score < config.low_performance_score {
            1.5
        } else {
            return None;
        };

        let proposed = Duration::from_secs_f64(current.as_secs_f64() * factor)
            .clamp(config.min_task_interval, config.max_task_interval);
        let change = if proposed > current {
            proposed - current
        } else {
            current - proposed
        };

        if change <= config.interval_hysteresis {
            return None;
        }

        self.adaptive_interval = Some(proposed);
        Some((current, proposed))
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            data_type: self.data_type.clone(),
            key_pattern: self.key_pattern.clone(),
            priority: self.priority,
            schedule: self.schedule,
            interval: self.interval,
            adaptive_interval: self.adaptive_interval,
            dependencies: self.dependencies.clone(),
            last_run: self.last_run,
            success_count: self.success_count,
            failure_count: self.failure_count,
            success_rate: self.success_rate(),
            items_loaded: self.items_loaded,
            performance_score: self.performance_score,
            last_error: self.last_error.clone(),
            dynamic: self.dynamic,
        }
    }
}

/// Serializable view of a task
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub id: String,
    pub data_type: String,
    pub key_pattern: String,
    pub priority: u8,
    pub schedule: ScheduleKind,
    pub interval: Option<Duration>,
    pub adaptive_interval: Option<Duration>,
    pub dependencies: Vec<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub items_loaded: u64,
    pub performance_score: f64,
    pub last_error: Option<String>,
    pub dynamic: bool,
}
