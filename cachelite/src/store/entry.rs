// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache entry and its metadata

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{elapsed_between, to_chrono};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

/// A stored value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: Arc<V>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub ttl: Option<Duration>,
    pub size_bytes: usize,
    pub priority: u8,
    pub refresh_threshold: f64,
    /// Insertion order, used to break eviction ties
    pub(crate) sequence: u64,
    pub(crate) refresh_signaled: bool,
}

impl<V> CacheEntry<V> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: String,
        value: Arc<V>,
        size_bytes: usize,
        ttl: Option<Duration>,
        priority: u8,
        refresh_threshold: f64,
        now: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl,
            size_bytes,
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            refresh_threshold,
            sequence,
            refresh_signaled: false,
        }
    }

    /// `now - created_at > ttl`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => elapsed_between(self.created_at, now) > ttl,
            None => false,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl.map(|ttl| self.created_at + to_chrono(ttl))
    }

    /// Fraction of the TTL still remaining, `None` for entries without TTL
    pub fn remaining_ttl_fraction(&self, now: DateTime<Utc>) -> Option<f64> {
        let ttl = self.ttl?;
        if ttl.is_zero() {
            return Some(0.0);
        }
        let age = elapsed_between(self.created_at, now);
        let remaining = ttl.saturating_sub(age);
        Some(remaining.as_secs_f64() / ttl.as_secs_f64())
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ttl_fraction(now)
            .map(|fraction| fraction < self.refresh_threshold)
            .unwrap_or(false)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            ttl: self.ttl,
            size_bytes: self.size_bytes,
            priority: self.priority,
        }
    }
}

/// Value-free snapshot of an entry's metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub ttl: Option<Duration>,
    pub size_bytes: usize,
    pub priority: u8,
}
