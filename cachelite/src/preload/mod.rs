// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Proactive cache population
//!
//! Tasks come in three kinds: startup tasks run once in dependency order,
//! periodic tasks run on an adaptive interval, and demand tasks fire when
//! the access pattern analyzer predicts a read. Every loader call goes
//! through a bounded [`WorkerPool`] so slow backends never stall cache reads.

pub mod scheduler;
pub mod scheduler_config;
pub mod task;
pub mod worker_pool;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheResult;

pub use scheduler::{PreloadScheduler, SchedulerStats, StartupReport, DYNAMIC_TASK_PREFIX};
pub use scheduler_config::SchedulerConfig;
pub use task::{compile_key_pattern, PreloadTask, ScheduleKind, TaskInfo, TaskSpec};
pub use worker_pool::{LoadOutcome, WorkerPool};

/// One item produced by a loader
#[derive(Debug, Clone)]
pub struct LoadedItem<V> {
    pub key: String,
    pub value: V,
    /// Falls back to the data type's configured TTL when absent
    pub ttl: Option<Duration>,
}

impl<V> LoadedItem<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Backend data source for a data type
///
/// Errors are contained by the scheduler and recorded in task statistics.
#[async_trait]
pub trait Loader<V>: Send + Sync {
    async fn load(&self, data_type: &str) -> CacheResult<Vec<LoadedItem<V>>>;
}
