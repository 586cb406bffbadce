// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CacheLite CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // -v/--verbose wins over --log-level; RUST_LOG still applies on top
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Version => {
            println!("{} {}", "CacheLite".bold().green(), cachelite::VERSION);
            println!("Self-tuning predictive in-process cache");
            Ok(())
        }

        Commands::Simulate {
            preset,
            config,
            minutes,
            step_secs,
            reads_per_step,
            keys_per_type,
            seed,
            format,
        } => cli::handle_simulate(cli::SimulationOptions {
            preset,
            config,
            minutes,
            step_secs,
            reads_per_step,
            keys_per_type,
            seed,
            format,
        }),

        Commands::Config { preset, check } => cli::handle_config(preset, check),
    }
}
