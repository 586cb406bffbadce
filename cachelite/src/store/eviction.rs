// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Victim selection for the eviction policies

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::{CacheEntry, EvictionPolicy};

/// Pick the entry the policy would remove next
///
/// Ties are broken by insertion order, oldest first.
pub fn select_victim<'a, V: 'a>(
    policy: EvictionPolicy,
    entries: impl Iterator<Item = &'a CacheEntry<V>>,
) -> Option<&'a CacheEntry<V>> {
    entries.min_by(|a, b| compare(policy, a, b).then(a.sequence.cmp(&b.sequence)))
}

fn compare<V>(policy: EvictionPolicy, a: &CacheEntry<V>, b: &CacheEntry<V>) -> Ordering {
    match policy {
        EvictionPolicy::Lru => a.last_accessed.cmp(&b.last_accessed),
        EvictionPolicy::Lfu => a.access_count.cmp(&b.access_count),
        EvictionPolicy::Ttl => expiry_rank(a.expires_at()).cmp(&expiry_rank(b.expires_at())),
    }
}

// Entries without a TTL sort after every expiring entry
fn expiry_rank(expires_at: Option<DateTime<Utc>>) -> (bool, Option<DateTime<Utc>>) {
    (expires_at.is_none(), expires_at)
}
