// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Report formatting for CLI output

use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use super::commands::OutputFormat;
use super::simulate::SimulationReport;

/// Report formatter for different output formats
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(report: &SimulationReport, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(report),
            OutputFormat::Json => Self::format_json(report),
        }
    }

    fn format_table(report: &SimulationReport) -> String {
        let mut output = String::new();
        let cache = &report.snapshot.cache;

        output.push_str(&format!("\n{}\n", "Simulation Results".bold().green()));
        output.push_str(&format!(
            "Simulated: {} minutes ({} steps, {} reads)\n",
            report.simulated_minutes, report.steps, report.reads
        ));
        output.push_str(&format!(
            "Startup: {} executed, {} forced, {} failed\n\n",
            report.startup.executed.len(),
            report.startup.forced.len(),
            report.startup.failed.len()
        ));

        let mut table = Self::table(&["Cache", "Value"]);
        table.add_row(vec!["Hit rate".to_string(), format!("{:.1}%", cache.hit_rate * 100.0)]);
        table.add_row(vec!["Hits / misses".to_string(), format!("{} / {}", cache.hits, cache.misses)]);
        table.add_row(vec![
            "Entries".to_string(),
            format!("{} / {}", cache.entry_count, cache.max_size),
        ]);
        table.add_row(vec![
            "Memory".to_string(),
            format!("{} / {} bytes", cache.memory_usage_bytes, cache.max_memory_bytes),
        ]);
        table.add_row(vec!["Evictions".to_string(), cache.evictions.to_string()]);
        table.add_row(vec!["Expired".to_string(), cache.expired.to_string()]);
        table.add_row(vec![
            "Refresh signals".to_string(),
            format!("{} ({} dropped)", cache.refresh_signals, cache.dropped_refresh_signals),
        ]);
        table.add_row(vec![
            "Tracked patterns".to_string(),
            report.snapshot.tracked_patterns.to_string(),
        ]);
        output.push_str(&table.to_string());
        output.push_str("\n\n");

        if !report.tasks.is_empty() {
            let mut table = Self::table(&["Task", "Kind", "Runs", "Success", "Items", "Interval"]);
            for task in &report.tasks {
                table.add_row(vec![
                    task.id.clone(),
                    task.schedule.to_string(),
                    (task.success_count + task.failure_count).to_string(),
                    format!("{:.0}%", task.success_rate * 100.0),
                    task.items_loaded.to_string(),
                    task.adaptive_interval
                        .map(|interval| format!("{}s", interval.as_secs()))
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            output.push_str(&table.to_string());
            output.push_str("\n\n");
        }

        if report.adjustments.is_empty() {
            output.push_str(&format!("{}\n", "No adaptive adjustments applied".yellow()));
        } else {
            let mut table = Self::table(&["Rule", "Parameter", "Change", "Reason", "Effect"]);
            for adjustment in &report.adjustments {
                table.add_row(vec![
                    adjustment.rule.clone(),
                    adjustment.parameter.clone(),
                    format!("{} -> {}", adjustment.old_value, adjustment.new_value),
                    adjustment.reason.clone(),
                    adjustment
                        .effectiveness_score
                        .map(|score| format!("{:+.3}", score))
                        .unwrap_or_else(|| "pending".to_string()),
                ]);
            }
            output.push_str(&table.to_string());
            output.push('\n');
        }

        output
    }

    fn format_json(report: &SimulationReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|err| {
            format!(
                "{{\"status\": \"error\", \"error\": \"Could not serialize report: {}\"}}",
                err
            )
        }) + "\n"
    }

    fn table(headers: &[&str]) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            headers
                .iter()
                .map(|header| Cell::new(header).fg(Color::Green))
                .collect::<Vec<Cell>>(),
        );
        table
    }
}
