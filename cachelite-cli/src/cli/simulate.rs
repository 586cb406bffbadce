// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Workload simulation and configuration commands

use async_trait::async_trait;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::commands::{OutputFormat, Preset};
use super::output::ReportFormatter;
use cachelite::adaptive::CacheAdjustment;
use cachelite::preload::{StartupReport, TaskInfo};
use cachelite::{
    CacheResult, EngineConfig, EngineSnapshot, LoadedItem, Loader, ManualClock, PredictiveCache,
    TaskSpec,
};

/// Data types in the synthetic catalog with their share of reads
const WORKLOAD_MIX: [(&str, f64); 3] = [("quote", 0.6), ("list", 0.3), ("schedule", 0.1)];

pub struct SimulationOptions {
    pub preset: Preset,
    pub config: Option<PathBuf>,
    pub minutes: u64,
    pub step_secs: u64,
    pub reads_per_step: usize,
    pub keys_per_type: usize,
    pub seed: Option<u64>,
    pub format: OutputFormat,
}

/// Everything printed at the end of a run
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub simulated_minutes: u64,
    pub steps: u64,
    pub reads: u64,
    pub startup: StartupReport,
    pub snapshot: EngineSnapshot,
    pub tasks: Vec<TaskInfo>,
    pub adjustments: Vec<CacheAdjustment>,
}

/// Serves the hottest quarter of a data type's keys
struct CatalogLoader {
    keys: Vec<String>,
}

#[async_trait]
impl Loader<String> for CatalogLoader {
    async fn load(&self, data_type: &str) -> CacheResult<Vec<LoadedItem<String>>> {
        log::trace!("catalog load for {}", data_type);
        Ok(self
            .keys
            .iter()
            .map(|key| LoadedItem::new(key.clone(), payload(key)))
            .collect())
    }
}

/// Fires when `period` of simulated time has passed since the last firing
struct Cadence {
    period: Duration,
    next: Duration,
}

impl Cadence {
    fn new(period: Duration) -> Self {
        Self {
            period,
            next: period,
        }
    }

    fn due(&mut self, elapsed: Duration) -> bool {
        if elapsed < self.next {
            return false;
        }
        while self.next <= elapsed {
            self.next += self.period;
        }
        true
    }
}

/// Handle the simulate command
pub fn handle_simulate(options: SimulationOptions) -> Result<(), Box<dyn std::error::Error>> {
    if options.step_secs == 0 {
        return Err("--step-secs must be greater than zero".into());
    }
    if options.keys_per_type == 0 {
        return Err("--keys-per-type must be greater than zero".into());
    }

    let config = match &options.config {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => options.preset.config(),
    };

    if let Some(seed) = options.seed {
        fastrand::seed(seed);
    }

    println!(
        "{}",
        format!(
            "Simulating {} minutes in {}s steps...",
            options.minutes, options.step_secs
        )
        .bold()
        .green()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(run_simulation(config, &options))?;

    print!("{}", ReportFormatter::format(&report, options.format));
    Ok(())
}

async fn run_simulation(
    config: EngineConfig,
    options: &SimulationOptions,
) -> CacheResult<SimulationReport> {
    let clock = ManualClock::starting_now();
    let cache: PredictiveCache<String> =
        PredictiveCache::with_clock(config, Arc::new(clock.clone()))?;

    let catalog = build_catalog(options.keys_per_type);
    register_loaders(&cache, &catalog)?;

    let startup = cache.scheduler().run_startup_tasks().await;

    let step = Duration::from_secs(options.step_secs);
    let steps = (options.minutes * 60) / options.step_secs;
    let engine_config = cache.config().clone();

    let mut periodic = Cadence::new(engine_config.scheduler.periodic_check_interval);
    let mut demand = Cadence::new(engine_config.scheduler.demand_poll_interval);
    let mut analysis = Cadence::new(engine_config.analyzer.analysis_interval);
    let mut sweep = Cadence::new(engine_config.store.sweep_interval);
    let mut evaluation = Cadence::new(engine_config.strategy.evaluation_interval);

    let mut elapsed = Duration::ZERO;
    let mut reads = 0u64;

    for _ in 0..steps {
        clock.advance(step);
        elapsed += step;

        for _ in 0..options.reads_per_step {
            read_through(&cache, &catalog);
            reads += 1;
        }

        if periodic.due(elapsed) {
            cache.scheduler().run_periodic_cycle().await;
        }
        if demand.due(elapsed) {
            cache.scheduler().run_demand_cycle().await;
        }
        if analysis.due(elapsed) {
            cache.analyzer().analyze(clock.now());
        }
        if sweep.due(elapsed) {
            cache.store().purge_expired();
        }
        if evaluation.due(elapsed) {
            for adjustment in cache.strategy().evaluate_and_adapt() {
                log::info!(
                    "t+{}s {} {} -> {}",
                    elapsed.as_secs(),
                    adjustment.parameter,
                    adjustment.old_value,
                    adjustment.new_value
                );
            }
        }
    }

    cache.scheduler().shutdown().await;

    Ok(SimulationReport {
        simulated_minutes: options.minutes,
        steps,
        reads,
        startup,
        snapshot: cache.snapshot(),
        tasks: cache.scheduler().tasks(),
        adjustments: cache.strategy().history(),
    })
}

fn build_catalog(keys_per_type: usize) -> HashMap<&'static str, Vec<String>> {
    WORKLOAD_MIX
        .iter()
        .map(|(data_type, _)| {
            let keys = (0..keys_per_type)
                .map(|i| format!("{}:{}", data_type, i))
                .collect();
            (*data_type, keys)
        })
        .collect()
}

fn register_loaders(
    cache: &PredictiveCache<String>,
    catalog: &HashMap<&'static str, Vec<String>>,
) -> CacheResult<()> {
    let mut loaders: HashMap<&str, Arc<dyn Loader<String>>> = HashMap::new();
    for (data_type, keys) in catalog {
        let hot = keys.len().div_ceil(4);
        let loader: Arc<dyn Loader<String>> = Arc::new(CatalogLoader {
            keys: keys[..hot].to_vec(),
        });
        cache.register_loader(*data_type, Arc::clone(&loader));
        loaders.insert(*data_type, loader);
    }

    // Reference data is warmed at startup; quotes refresh every minute
    if let Some(loader) = loaders.get("list") {
        cache.register_task(
            "warm-lists",
            TaskSpec::startup("list", Arc::clone(loader)).with_priority(8),
        )?;
    }
    if let Some(loader) = loaders.get("schedule") {
        cache.register_task(
            "warm-schedules",
            TaskSpec::startup("schedule", Arc::clone(loader)).depends_on("warm-lists"),
        )?;
    }
    if let Some(loader) = loaders.get("quote") {
        cache.register_task(
            "refresh-quotes",
            TaskSpec::periodic("quote", Arc::clone(loader), Duration::from_secs(60))
                .with_priority(7),
        )?;
    }
    Ok(())
}

// Skewed toward low key indexes so a small hot set dominates
fn pick_key<'a>(catalog: &'a HashMap<&'static str, Vec<String>>) -> Option<&'a String> {
    let roll = fastrand::f64();
    let mut cumulative = 0.0;
    let data_type = WORKLOAD_MIX
        .iter()
        .find(|(_, share)| {
            cumulative += share;
            roll < cumulative
        })
        .map_or(WORKLOAD_MIX[0].0, |(data_type, _)| *data_type);

    let keys = catalog.get(data_type)?;
    let index = (fastrand::f64().powi(3) * keys.len() as f64) as usize;
    keys.get(index.min(keys.len().saturating_sub(1)))
}

fn read_through(cache: &PredictiveCache<String>, catalog: &HashMap<&'static str, Vec<String>>) {
    let Some(key) = pick_key(catalog) else {
        return;
    };
    if cache.get(key).is_none() {
        if let Err(err) = cache.set(key.clone(), payload(key), None, None) {
            log::warn!("read-through store of {} failed: {}", key, err);
        }
    }
}

fn payload(key: &str) -> String {
    format!("{{\"key\":\"{}\",\"source\":\"backend\"}}", key)
}

/// Handle the config command
pub fn handle_config(
    preset: Preset,
    check: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match check {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)?;
            match EngineConfig::from_json_str(&contents) {
                Ok(config) => {
                    println!("{}", format!("✅ {:?} is valid", path).green());
                    println!(
                        "  store: {} entries / {} bytes, {} eviction",
                        config.store.max_size,
                        config.store.max_memory_bytes,
                        config.store.eviction_policy
                    );
                    println!(
                        "  preload: {} workers, strategy: {} mode",
                        config.scheduler.concurrency_limit, config.strategy.mode
                    );
                    Ok(())
                }
                Err(err) => {
                    println!("{}", format!("❌ {:?}: {}", path, err).red());
                    Err(err.into())
                }
            }
        }
        None => {
            println!("{}", preset.config().to_json_pretty()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_fires_once_per_period() {
        let mut cadence = Cadence::new(Duration::from_secs(30));
        let fired: Vec<u64> = (1..=9)
            .map(|step| step * 10)
            .filter(|secs| cadence.due(Duration::from_secs(*secs)))
            .collect();
        assert_eq!(fired, vec![30, 60, 90]);
    }

    #[test]
    fn test_catalog_keys_are_typed() {
        let catalog = build_catalog(8);
        assert_eq!(catalog["quote"].len(), 8);
        assert_eq!(catalog["list"][0], "list:0");

        fastrand::seed(7);
        for _ in 0..100 {
            let key = pick_key(&catalog).unwrap();
            assert!(WORKLOAD_MIX.iter().any(|(dt, _)| key.starts_with(dt)));
        }
    }

    #[tokio::test]
    async fn test_short_simulation_produces_report() {
        let options = SimulationOptions {
            preset: Preset::Default,
            config: None,
            minutes: 10,
            step_secs: 10,
            reads_per_step: 20,
            keys_per_type: 12,
            seed: Some(42),
            format: OutputFormat::Json,
        };

        let report = run_simulation(EngineConfig::default(), &options).await.unwrap();

        assert_eq!(report.steps, 60);
        assert_eq!(report.reads, 1200);
        assert_eq!(report.startup.executed, vec!["warm-lists", "warm-schedules"]);
        assert_eq!(
            report.snapshot.cache.hits + report.snapshot.cache.misses,
            1200
        );
        assert!(report.snapshot.scheduler.successful_executions >= 2);
    }
}
