// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the cache engine

use std::time::Duration;
use thiserror::Error;

/// Cache engine errors
///
/// Only [`CacheStore::set`](crate::store::CacheStore::set) surfaces an error to
/// request handlers. Everything raised inside background loops is logged and
/// counted in component statistics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Capacity exceeded: entry needs {requested} bytes, limit {limit} bytes")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("Load timeout: task {task_id} exceeded {timeout:?}")]
    LoadTimeout { task_id: String, timeout: Duration },

    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Invalid policy transition: {0}")]
    InvalidPolicyTransition(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Preload scheduler is stopped")]
    SchedulerStopped,
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::InvalidConfiguration(err.to_string())
    }
}

impl From<regex::Error> for CacheError {
    fn from(err: regex::Error) -> Self {
        CacheError::InvalidPolicyTransition(err.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
