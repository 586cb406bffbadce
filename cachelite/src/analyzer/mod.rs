// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Access pattern learning
//!
//! Every read is appended to a key-level and a type-level [`AccessPattern`].
//! From the bounded history the analyzer derives velocity, trend,
//! seasonality and a predicted next access, and turns those into ranked
//! [`PreloadCandidate`]s for the preload scheduler.

pub mod access_pattern;
pub mod analyzer_config;
pub mod pattern_analyzer;

pub use access_pattern::AccessPattern;
pub use analyzer_config::{AnalyzerConfig, PreloadThresholds};
pub use pattern_analyzer::{AccessPatternAnalyzer, AnalysisReport, AnalyzerStats, PreloadCandidate};

/// Data type of a key: the prefix before the first `:`, or the whole key
pub fn data_type_of(key: &str) -> &str {
    match key.split_once(':') {
        Some((prefix, _)) if !prefix.is_empty() => prefix,
        _ => key,
    }
}
