// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The aggregate predictive cache engine

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adaptive::{AdaptiveCacheStrategy, StrategyStatus};
use crate::analyzer::{data_type_of, AccessPatternAnalyzer, AnalyzerStats};
use crate::background::{join_with_timeout, spawn_periodic, stop_channel};
use crate::clock::{system_clock, SharedClock};
use crate::config::EngineConfig;
use crate::error::CacheResult;
use crate::preload::{Loader, PreloadScheduler, SchedulerStats, TaskSpec};
use crate::store::{CacheStats, CacheStore, CacheValue, Lookup};

/// Point-in-time view of every component, for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub cache: CacheStats,
    pub analyzer: AnalyzerStats,
    pub scheduler: SchedulerStats,
    pub strategy: StrategyStatus,
    pub tracked_patterns: usize,
    pub running: bool,
}

struct Lifecycle {
    stop: watch::Sender<bool>,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

/// Cache store, pattern analyzer, preload scheduler and adaptive strategy
/// wired into one feedback loop
///
/// Reads through [`get`](Self::get) feed the analyzer, the scheduler
/// prefetches what the analyzer predicts, and the strategy retunes the store
/// from its statistics. [`start`](Self::start) spawns the four background
/// loops on the current tokio runtime.
pub struct PredictiveCache<V> {
    config: EngineConfig,
    store: Arc<CacheStore<V>>,
    analyzer: Arc<AccessPatternAnalyzer>,
    scheduler: Arc<PreloadScheduler<V>>,
    strategy: Arc<AdaptiveCacheStrategy>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl<V: CacheValue> PredictiveCache<V> {
    pub fn new(config: EngineConfig) -> CacheResult<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> CacheResult<Self> {
        config.validate()?;

        let store = Arc::new(CacheStore::with_clock(config.store.clone(), Arc::clone(&clock))?);
        let analyzer = Arc::new(AccessPatternAnalyzer::with_clock(
            config.analyzer.clone(),
            Arc::clone(&clock),
        )?);
        let scheduler = Arc::new(PreloadScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&store),
            Arc::clone(&analyzer),
        )?);
        let strategy = Arc::new(AdaptiveCacheStrategy::with_clock(
            config.strategy.clone(),
            clock,
        )?);
        strategy.attach(Arc::clone(&store) as _);

        Ok(Self {
            config,
            store,
            analyzer,
            scheduler,
            strategy,
            lifecycle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read a key and record the access under the key's data type
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.lookup(key).into_value()
    }

    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let result = self.store.lookup(key);
        self.analyzer.record_access(key, data_type_of(key), None);
        result
    }

    pub fn set(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Option<Duration>,
        priority: Option<u8>,
    ) -> CacheResult<()> {
        self.store.set(key, value, ttl, priority)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.store.delete(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.store.exists(key)
    }

    pub fn clear(&self) {
        self.store.clear()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.snapshot_stats()
    }

    /// Record a read served outside [`get`](Self::get)
    pub fn record_access(&self, key: &str, data_type: &str) {
        self.analyzer.record_access(key, data_type, None);
    }

    pub fn register_task(&self, id: impl Into<String>, spec: TaskSpec<V>) -> CacheResult<()> {
        self.scheduler.register_task(id, spec)
    }

    pub fn register_loader(&self, data_type: impl Into<String>, loader: Arc<dyn Loader<V>>) {
        self.scheduler.register_loader(data_type, loader)
    }

    pub fn store(&self) -> &Arc<CacheStore<V>> {
        &self.store
    }

    pub fn analyzer(&self) -> &Arc<AccessPatternAnalyzer> {
        &self.analyzer
    }

    pub fn scheduler(&self) -> &Arc<PreloadScheduler<V>> {
        &self.scheduler
    }

    pub fn strategy(&self) -> &Arc<AdaptiveCacheStrategy> {
        &self.strategy
    }

    /// Spawn the expiry sweep, pattern analysis, preload and adaptive loops
    ///
    /// Must be called inside a tokio runtime. Calling it on a running engine
    /// is a no-op.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_some() {
            log::debug!("engine already running");
            return;
        }

        let (stop, stop_rx) = stop_channel();
        let mut loops = Vec::with_capacity(3);

        let store = Arc::clone(&self.store);
        loops.push((
            "expiry sweep",
            spawn_periodic(
                "expiry sweep",
                self.config.store.sweep_interval,
                stop_rx.clone(),
                move || {
                    let store = Arc::clone(&store);
                    async move {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            log::debug!("expiry sweep removed {} entries", purged);
                        }
                    }
                },
            ),
        ));

        let analyzer = Arc::clone(&self.analyzer);
        loops.push((
            "pattern analysis",
            spawn_periodic(
                "pattern analysis",
                self.config.analyzer.analysis_interval,
                stop_rx.clone(),
                move || {
                    let analyzer = Arc::clone(&analyzer);
                    async move {
                        let report = analyzer.analyze(analyzer.clock().now());
                        log::debug!(
                            "analysis: {} keys, {} types, {} pruned, {} candidates",
                            report.tracked_keys,
                            report.tracked_types,
                            report.pruned,
                            report.preload_candidates
                        );
                    }
                },
            ),
        ));

        loops.push(("preload scheduler", self.scheduler.spawn(stop_rx)));
        self.strategy.start(Arc::clone(&self.store) as _);

        *lifecycle = Some(Lifecycle { stop, loops });
        log::info!("predictive cache started");
    }

    /// Signal every loop, wait for them, then drain the preload workers
    pub async fn stop(&self) {
        let lifecycle = self.lifecycle.lock().take();
        let Some(Lifecycle { stop, loops }) = lifecycle else {
            return;
        };

        // Receivers may already be gone if a loop exited on its own
        let _ = stop.send(true);
        self.strategy.stop().await;

        // Loops exit at their next await point; the grace covers a stuck tick
        let grace = self.config.scheduler.task_timeout + Duration::from_secs(1);
        for (name, handle) in loops {
            join_with_timeout(name, handle, grace).await;
        }

        self.scheduler.shutdown().await;
        log::info!("predictive cache stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().is_some()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            cache: self.store.snapshot_stats(),
            analyzer: self.analyzer.stats(),
            scheduler: self.scheduler.get_stats(),
            strategy: self.strategy.get_status(),
            tracked_patterns: self.analyzer.tracked_keys(),
            running: self.is_running(),
        }
    }
}
