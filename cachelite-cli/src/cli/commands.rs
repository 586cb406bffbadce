// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line definitions

use cachelite::EngineConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CacheLite command-line interface
#[derive(Parser)]
#[command(name = "cachelite")]
#[command(about = "CacheLite workload simulator and configuration tool")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<log::Level>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print version information
    Version,

    /// Replay a synthetic read workload against a predictive cache
    Simulate {
        /// Built-in configuration preset
        #[arg(long, value_enum, default_value = "default")]
        preset: Preset,

        /// JSON configuration file; overrides the preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Simulated minutes
        #[arg(short, long, default_value = "60")]
        minutes: u64,

        /// Simulated seconds per step
        #[arg(long, default_value = "10")]
        step_secs: u64,

        /// Reads issued per step
        #[arg(long, default_value = "50")]
        reads_per_step: usize,

        /// Distinct keys per data type
        #[arg(long, default_value = "40")]
        keys_per_type: usize,

        /// Random seed for a reproducible workload
        #[arg(long)]
        seed: Option<u64>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Print a preset configuration, or validate a configuration file
    Config {
        #[arg(long, value_enum, default_value = "default")]
        preset: Preset,

        /// Validate this JSON file instead of printing a preset
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Default,
    ReadOptimized,
    MemoryConstrained,
}

impl Preset {
    pub fn config(self) -> EngineConfig {
        match self {
            Preset::Default => EngineConfig::default(),
            Preset::ReadOptimized => EngineConfig::read_optimized(),
            Preset::MemoryConstrained => EngineConfig::memory_constrained(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
