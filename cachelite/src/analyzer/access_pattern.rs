// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-key and per-type access history with derived forecasts

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

use super::PreloadThresholds;
use crate::clock::{elapsed_between, to_chrono};

/// Largest fraction of the average interval a trend may shift a prediction by
const MAX_TREND_SHIFT: f64 = 0.3;

/// Accesses needed for full count-based confidence
const CONFIDENCE_SATURATION: f64 = 10.0;

/// Bounded access history for one key or data type
#[derive(Debug, Clone, Serialize)]
pub struct AccessPattern {
    pub id: String,
    /// Data type of a key pattern; `None` for type-level patterns
    pub data_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    /// Total accesses ever recorded, not just those still in the window
    pub access_count: u64,
    pub average_interval: Option<Duration>,
    /// Events per minute over the retained window
    pub access_velocity: f64,
    /// [-1, 1]; positive means accelerating
    pub trend_score: f64,
    /// [0, 1]; 1 means perfectly periodic
    pub seasonality_score: f64,
    /// [0, 1]
    pub prediction_confidence: f64,
    pub next_predicted_access: Option<DateTime<Utc>>,
    #[serde(skip)]
    timestamps: VecDeque<DateTime<Utc>>,
}

impl AccessPattern {
    pub fn new(id: impl Into<String>, data_type: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            data_type,
            first_seen: at,
            access_count: 0,
            average_interval: None,
            access_velocity: 0.0,
            trend_score: 0.0,
            seasonality_score: 0.0,
            prediction_confidence: 0.0,
            next_predicted_access: None,
            timestamps: VecDeque::new(),
        }
    }

    /// Append an access and recompute every derived field
    pub fn record(&mut self, at: DateTime<Utc>, max_events: usize, max_window: Duration) {
        // Late events are slotted in order so derived fields stay deterministic
        let position = self.timestamps.partition_point(|ts| *ts <= at);
        self.timestamps.insert(position, at);
        self.access_count += 1;

        self.trim(max_events, max_window);
        self.recompute();
    }

    fn trim(&mut self, max_events: usize, max_window: Duration) {
        while self.timestamps.len() > max_events {
            self.timestamps.pop_front();
        }

        if let Some(&newest) = self.timestamps.back() {
            let cutoff = newest - to_chrono(max_window);
            while self.timestamps.front().is_some_and(|ts| *ts < cutoff) {
                self.timestamps.pop_front();
            }
        }
    }

    pub fn window_len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.timestamps.iter()
    }

    fn recompute(&mut self) {
        let events: Vec<DateTime<Utc>> = self.timestamps.iter().copied().collect();
        let intervals: Vec<f64> = events
            .windows(2)
            .map(|pair| elapsed_between(pair[0], pair[1]).as_secs_f64())
            .collect();

        let mean_interval = mean(&intervals);
        self.average_interval = mean_interval.map(Duration::from_secs_f64);
        self.access_velocity = velocity(&events);
        self.trend_score = trend(&events);
        self.seasonality_score = seasonality(&intervals);

        let count_confidence = (events.len() as f64 / CONFIDENCE_SATURATION).min(1.0);
        self.prediction_confidence = (count_confidence + 0.5 * self.seasonality_score).min(1.0);

        self.next_predicted_access = match (self.last_access(), mean_interval) {
            (Some(last), Some(avg)) if avg > 0.0 => {
                let shift = MAX_TREND_SHIFT * self.trend_score * avg;
                let offset = Duration::from_secs_f64((avg - shift).max(0.0));
                Some(last + to_chrono(offset))
            }
            _ => None,
        };
    }

    /// Near-term predicted reader, or a rapidly popularizing key
    pub fn should_preload(&self, now: DateTime<Utc>, thresholds: &PreloadThresholds) -> bool {
        let imminent = self.next_predicted_access.is_some_and(|predicted| {
            let window = to_chrono(thresholds.near_term_window);
            let delta = predicted - now;
            delta <= window && delta >= -window
        }) && self.prediction_confidence >= thresholds.min_confidence;

        let popularizing = self.access_velocity > thresholds.min_velocity
            && self.trend_score > thresholds.min_trend;

        imminent || popularizing
    }

    /// Never reached the popularity threshold and idle past retention
    pub fn is_stale(&self, now: DateTime<Utc>, popularity_threshold: u64, retention: Duration) -> bool {
        let last = self.last_access().unwrap_or(self.first_seen);
        self.access_count < popularity_threshold && elapsed_between(last, now) > retention
    }

    /// Ranking used when choosing which candidates to prefetch first
    pub fn priority_score(&self) -> f64 {
        self.prediction_confidence * 0.5
            + (self.access_velocity / 10.0).min(1.0) * 0.3
            + self.trend_score.max(0.0) * 0.2
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// (count - 1) / span_minutes
fn velocity(events: &[DateTime<Utc>]) -> f64 {
    match (events.first(), events.last()) {
        (Some(&first), Some(&last)) if events.len() >= 2 => {
            let span_minutes = elapsed_between(first, last).as_secs_f64() / 60.0;
            if span_minutes > 0.0 {
                (events.len() - 1) as f64 / span_minutes
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn trend(events: &[DateTime<Utc>]) -> f64 {
    if events.len() < 4 {
        return 0.0;
    }

    let (first_half, second_half) = events.split_at(events.len() / 2);
    let early = velocity(first_half);
    let late = velocity(second_half);
    let scale = early.max(late);

    if scale > 0.0 {
        ((late - early) / scale).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// 1 - min(CV, 2) / 2 over inter-access intervals
fn seasonality(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }

    let avg = match mean(intervals) {
        Some(avg) if avg > 0.0 => avg,
        _ => return 0.0,
    };

    let variance =
        intervals.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / intervals.len() as f64;
    let cv = variance.sqrt() / avg;

    1.0 - cv.min(2.0) / 2.0
}
