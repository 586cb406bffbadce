// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for CacheLite
//!
//! Provides a workload simulator that drives every engine component on a
//! virtual clock, and helpers to print and validate configuration files.

pub mod commands;
pub mod output;
pub mod simulate;

pub use commands::{Cli, Commands};
pub use simulate::{handle_config, handle_simulate, SimulationOptions};
