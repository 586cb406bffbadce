// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Preload task registry and execution

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{
    LoadOutcome, LoadedItem, Loader, PreloadTask, ScheduleKind, SchedulerConfig, TaskInfo, TaskSpec,
    WorkerPool,
};
use crate::analyzer::{data_type_of, AccessPatternAnalyzer};
use crate::background::{stopped, until_stopped};
use crate::clock::SharedClock;
use crate::error::{CacheError, CacheResult};
use crate::store::{CacheStore, CacheValue, RefreshSignal};

/// Id prefix of tasks created from the loader registry
pub const DYNAMIC_TASK_PREFIX: &str = "demand:";

/// Score given to keys reported near expiry by the store
const REFRESH_SIGNAL_SCORE: f64 = 1.0;

/// Scheduler-wide statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub registered_tasks: usize,
    pub startup_tasks: usize,
    pub periodic_tasks: usize,
    pub demand_tasks: usize,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub timeouts: u64,
    pub items_loaded: u64,
    /// Loaded items the store refused (capacity)
    pub store_rejections: u64,
    pub demand_triggers: u64,
    pub suppressed_retriggers: u64,
    pub refresh_signals_consumed: u64,
    pub dropped_requests: u64,
    pub startup_completed: bool,
    pub average_performance_score: f64,
}

/// Outcome of the startup pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    /// Task ids in execution order
    pub executed: Vec<String>,
    /// Tasks run before their dependencies because of a cycle
    pub forced: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Default)]
struct Counters {
    total_executions: u64,
    successful_executions: u64,
    failed_executions: u64,
    timeouts: u64,
    items_loaded: u64,
    store_rejections: u64,
    demand_triggers: u64,
    suppressed_retriggers: u64,
    refresh_signals_consumed: u64,
    dropped_requests: u64,
}

struct PendingLoad<V> {
    task_id: String,
    data_type: String,
    priority: u8,
    response: oneshot::Receiver<LoadOutcome<V>>,
}

struct DemandCandidate {
    key: String,
    data_type: String,
    score: f64,
    average_interval: Option<Duration>,
}

/// Runs preload tasks against a cache store
///
/// Loader calls execute on a [`WorkerPool`] started on first use; only the
/// resulting `set` calls touch the store lock.
pub struct PreloadScheduler<V> {
    config: SchedulerConfig,
    store: Arc<CacheStore<V>>,
    analyzer: Arc<AccessPatternAnalyzer>,
    clock: SharedClock,
    tasks: RwLock<HashMap<String, PreloadTask<V>>>,
    loaders: RwLock<HashMap<String, Arc<dyn Loader<V>>>>,
    refresh_signals: Mutex<Option<mpsc::Receiver<RefreshSignal>>>,
    pool: Mutex<Option<Arc<WorkerPool<V>>>>,
    stopped: AtomicBool,
    startup_completed: AtomicBool,
    counters: Mutex<Counters>,
}

impl<V: CacheValue> PreloadScheduler<V> {
    /// Build a scheduler; takes over the store's near-expiry signal stream
    pub fn new(
        config: SchedulerConfig,
        store: Arc<CacheStore<V>>,
        analyzer: Arc<AccessPatternAnalyzer>,
    ) -> CacheResult<Self> {
        config.validate()?;

        let refresh_signals = store.take_refresh_receiver();
        if refresh_signals.is_none() {
            log::warn!("refresh signal stream already taken; demand cycle uses analyzer only");
        }

        Ok(Self {
            clock: Arc::clone(store.clock()),
            config,
            store,
            analyzer,
            tasks: RwLock::new(HashMap::new()),
            loaders: RwLock::new(HashMap::new()),
            refresh_signals: Mutex::new(refresh_signals),
            pool: Mutex::new(None),
            stopped: AtomicBool::new(false),
            startup_completed: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn register_task(&self, id: impl Into<String>, spec: TaskSpec<V>) -> CacheResult<()> {
        let id = id.into();
        let task = PreloadTask::from_spec(id.clone(), spec)?;

        let mut tasks = self.tasks.write();
        if tasks.contains_key(&id) {
            return Err(CacheError::InvalidPolicyTransition(format!(
                "task {} is already registered",
                id
            )));
        }

        log::info!(
            "registered preload task_id={} kind={} data_type={} priority={}",
            id,
            task.schedule,
            task.data_type,
            task.priority
        );
        tasks.insert(id, task);
        Ok(())
    }

    pub fn unregister_task(&self, id: &str) -> CacheResult<()> {
        match self.tasks.write().remove(id) {
            Some(_) => {
                log::info!("unregistered preload task_id={}", id);
                Ok(())
            }
            None => Err(CacheError::TaskNotFound(id.to_string())),
        }
    }

    /// Loader used to create demand tasks for `data_type` on the fly
    pub fn register_loader(&self, data_type: impl Into<String>, loader: Arc<dyn Loader<V>>) {
        let data_type = data_type.into();
        log::debug!("registered loader for data_type={}", data_type);
        self.loaders.write().insert(data_type, loader);
    }

    pub fn task_info(&self, id: &str) -> Option<TaskInfo> {
        self.tasks.read().get(id).map(PreloadTask::info)
    }

    /// All tasks, highest priority first
    pub fn tasks(&self) -> Vec<TaskInfo> {
        let mut infos: Vec<TaskInfo> = self.tasks.read().values().map(PreloadTask::info).collect();
        infos.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    /// Run a task now regardless of its schedule; returns the items stored
    pub async fn force_execute(&self, id: &str) -> CacheResult<usize> {
        let pending = self.dispatch(id)?;
        self.complete(pending).await
    }

    /// Run every startup task once in dependency order
    ///
    /// Tasks run in waves. A wave holds every pending task whose dependencies
    /// have all executed, highest priority first. Missing dependencies are
    /// ignored. When no task is ready, the highest-priority pending task is
    /// forced so a cycle never blocks the rest.
    pub async fn run_startup_tasks(&self) -> StartupReport {
        let mut report = StartupReport::default();
        let mut pending = self.startup_order();
        let mut executed: HashSet<String> = HashSet::new();

        self.warn_unresolvable_dependencies(&pending);

        let max_iterations = self.config.startup_max_iterations.max(pending.len() + 1);
        let mut iterations = 0;

        while !pending.is_empty() && iterations < max_iterations {
            iterations += 1;

            let mut wave: Vec<String> = pending
                .iter()
                .filter(|(_, deps)| deps.iter().all(|dep| self.dependency_satisfied(dep, &executed)))
                .map(|(id, _)| id.clone())
                .collect();

            if wave.is_empty() {
                let (forced, deps) = &pending[0];
                log::warn!(
                    "startup dependency cycle, forcing task_id={} (waiting on {:?})",
                    forced,
                    deps
                );
                report.forced.push(forced.clone());
                wave.push(forced.clone());
            }

            pending.retain(|(id, _)| !wave.contains(id));
            for (id, result) in self.execute_many(&wave).await {
                if result.is_err() {
                    report.failed.push(id.clone());
                }
                report.executed.push(id.clone());
                executed.insert(id);
            }
        }

        if !pending.is_empty() {
            let leftover: Vec<String> = pending.into_iter().map(|(id, _)| id).collect();
            log::warn!("startup iteration bound reached, running {:?} best-effort", leftover);
            for (id, result) in self.execute_many(&leftover).await {
                if result.is_err() {
                    report.failed.push(id.clone());
                }
                report.executed.push(id);
            }
        }

        self.startup_completed.store(true, Ordering::SeqCst);
        log::info!(
            "startup preload finished: {} executed, {} forced, {} failed",
            report.executed.len(),
            report.forced.len(),
            report.failed.len()
        );
        report
    }

    // (id, dependencies) for startup tasks, highest priority first
    fn startup_order(&self) -> Vec<(String, Vec<String>)> {
        let tasks = self.tasks.read();
        let mut startup: Vec<&PreloadTask<V>> = tasks
            .values()
            .filter(|task| task.schedule == ScheduleKind::Startup)
            .collect();
        startup.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        startup
            .into_iter()
            .map(|task| (task.id.clone(), task.dependencies.clone()))
            .collect()
    }

    fn warn_unresolvable_dependencies(&self, pending: &[(String, Vec<String>)]) {
        let tasks = self.tasks.read();
        for (id, deps) in pending {
            for dep in deps {
                if !tasks.contains_key(dep) {
                    log::warn!("task_id={} depends on unknown task {}, ignoring", id, dep);
                }
            }
        }
    }

    // Executed this pass, ran before, or cannot run at startup at all
    fn dependency_satisfied(&self, dep: &str, executed: &HashSet<String>) -> bool {
        if executed.contains(dep) {
            return true;
        }
        match self.tasks.read().get(dep) {
            None => true,
            Some(task) => task.last_run.is_some() || task.schedule != ScheduleKind::Startup,
        }
    }

    /// Run every periodic task whose interval has elapsed
    pub async fn run_periodic_cycle(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<String> = {
            let tasks = self.tasks.read();
            let mut due: Vec<&PreloadTask<V>> = tasks.values().filter(|task| task.is_due(now)).collect();
            due.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
            due.into_iter().map(|task| task.id.clone()).collect()
        };

        if due.is_empty() {
            return 0;
        }

        log::debug!("periodic cycle: {} tasks due", due.len());
        self.execute_many(&due).await.len()
    }

    /// Fire demand tasks for near-expiry keys and analyzer candidates
    pub async fn run_demand_cycle(&self) -> usize {
        let now = self.clock.now();
        let candidates = self.demand_candidates(now);
        if candidates.is_empty() {
            return 0;
        }

        let selected = self.select_demand_tasks(&candidates, now);
        if selected.is_empty() {
            return 0;
        }

        self.counters.lock().demand_triggers += selected.len() as u64;
        log::debug!("demand cycle: triggering {:?}", selected);
        self.execute_many(&selected).await.len()
    }

    fn demand_candidates(&self, now: DateTime<Utc>) -> Vec<DemandCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for key in self.drain_refresh_signals() {
            if !seen.insert(key.clone()) {
                continue;
            }
            let average_interval = self.analyzer.pattern(&key).and_then(|p| p.average_interval);
            candidates.push(DemandCandidate {
                data_type: data_type_of(&key).to_string(),
                key,
                score: REFRESH_SIGNAL_SCORE,
                average_interval,
            });
        }

        for candidate in self.analyzer.preload_candidates(now, usize::MAX) {
            if !seen.insert(candidate.key.clone()) {
                continue;
            }
            candidates.push(DemandCandidate {
                key: candidate.key,
                data_type: candidate.data_type,
                score: candidate.priority_score,
                average_interval: candidate.average_interval,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        candidates
    }

    fn drain_refresh_signals(&self) -> Vec<String> {
        let mut receiver = self.refresh_signals.lock();
        let Some(receiver) = receiver.as_mut() else {
            return Vec::new();
        };

        let mut keys = Vec::new();
        while let Ok(signal) = receiver.try_recv() {
            keys.push(signal.key);
        }
        self.counters.lock().refresh_signals_consumed += keys.len() as u64;
        keys
    }

    // Top-N distinct tasks, honouring each key's re-trigger floor
    fn select_demand_tasks(&self, candidates: &[DemandCandidate], now: DateTime<Utc>) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();
        let mut suppressed = 0u64;

        for candidate in candidates {
            if selected.len() >= self.config.demand_top_n {
                break;
            }

            let Some(task_id) = self.demand_task_for(&candidate.key, &candidate.data_type) else {
                continue;
            };
            if selected.contains(&task_id) {
                continue;
            }

            let floor = candidate
                .average_interval
                .unwrap_or(Duration::ZERO)
                .max(self.config.min_retrigger_interval);
            let recently_ran = self
                .tasks
                .read()
                .get(&task_id)
                .is_some_and(|task| task.ran_within(now, floor));
            if recently_ran {
                suppressed += 1;
                continue;
            }

            selected.push(task_id);
        }

        if suppressed > 0 {
            self.counters.lock().suppressed_retriggers += suppressed;
        }
        selected
    }

    /// Highest-priority demand task matching the key, creating one from the
    /// loader registry when none is registered
    fn demand_task_for(&self, key: &str, data_type: &str) -> Option<String> {
        let existing = {
            let tasks = self.tasks.read();
            tasks
                .values()
                .filter(|task| {
                    task.schedule == ScheduleKind::Demand
                        && task.data_type == data_type
                        && task.matches(key)
                })
                .max_by(|a, b| a.priority.cmp(&b.priority).then_with(|| b.id.cmp(&a.id)))
                .map(|task| task.id.clone())
        };
        if existing.is_some() {
            return existing;
        }

        let loader = self.loaders.read().get(data_type).cloned()?;
        let id = format!("{}{}", DYNAMIC_TASK_PREFIX, data_type);

        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get(&id) {
            return task.matches(key).then_some(id);
        }

        let mut task = PreloadTask::from_spec(id.clone(), TaskSpec::demand(data_type, loader)).ok()?;
        if !task.matches(key) {
            return None;
        }
        task.dynamic = true;
        log::info!("created dynamic demand task_id={}", id);
        tasks.insert(id.clone(), task);
        Some(id)
    }

    fn pool(&self) -> CacheResult<Arc<WorkerPool<V>>> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(CacheError::SchedulerStopped);
        }
        let mut pool = self.pool.lock();
        let pool = pool.get_or_insert_with(|| {
            Arc::new(WorkerPool::start(
                self.config.concurrency_limit,
                self.config.queue_capacity,
            ))
        });
        Ok(Arc::clone(pool))
    }

    fn dispatch(&self, id: &str) -> CacheResult<PendingLoad<V>> {
        let (data_type, priority, loader) = {
            let tasks = self.tasks.read();
            let task = tasks
                .get(id)
                .ok_or_else(|| CacheError::TaskNotFound(id.to_string()))?;
            (task.data_type.clone(), task.priority, Arc::clone(&task.loader))
        };

        let pool = self.pool()?;
        match pool.submit(id, &data_type, loader, self.config.task_timeout) {
            Ok(response) => Ok(PendingLoad {
                task_id: id.to_string(),
                data_type,
                priority,
                response,
            }),
            Err(err) => {
                self.counters.lock().dropped_requests += 1;
                Err(err)
            }
        }
    }

    // Store the loaded items and fold the outcome into task statistics
    async fn complete(&self, pending: PendingLoad<V>) -> CacheResult<usize> {
        let PendingLoad {
            task_id,
            data_type,
            priority,
            response,
        } = pending;
        let outcome = response.await.map_err(|_| CacheError::SchedulerStopped)?;

        let result = match outcome.result {
            Ok(items) if items.is_empty() => Err(CacheError::LoadError(format!(
                "loader for {} returned no data",
                data_type
            ))),
            Ok(items) => Ok(self.store_items(&task_id, &data_type, priority, items)),
            Err(err) => Err(err),
        };

        self.record_outcome(&task_id, &result, outcome.elapsed);
        result
    }

    fn store_items(
        &self,
        task_id: &str,
        data_type: &str,
        priority: u8,
        items: Vec<LoadedItem<V>>,
    ) -> usize {
        let default_ttl = self.config.ttl_for(data_type);
        let mut stored = 0;
        let mut rejected = 0u64;

        for item in items {
            let ttl = item.ttl.or(default_ttl);
            match self.store.set(item.key, item.value, ttl, Some(priority)) {
                Ok(()) => stored += 1,
                Err(err) => {
                    rejected += 1;
                    log::warn!("task_id={} could not store item: {}", task_id, err);
                }
            }
        }

        if rejected > 0 {
            self.counters.lock().store_rejections += rejected;
        }
        stored
    }

    fn record_outcome(&self, task_id: &str, result: &CacheResult<usize>, elapsed: Duration) {
        let now = self.clock.now();
        let alpha = self.config.performance_smoothing;

        {
            let mut counters = self.counters.lock();
            counters.total_executions += 1;
            match result {
                Ok(items) => {
                    counters.successful_executions += 1;
                    counters.items_loaded += *items as u64;
                }
                Err(err) => {
                    counters.failed_executions += 1;
                    if matches!(err, CacheError::LoadTimeout { .. }) {
                        counters.timeouts += 1;
                    }
                }
            }
        }

        let mut tasks = self.tasks.write();
        // Unregistered while its load was in flight
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };

        match result {
            Ok(items) => {
                task.record_success(*items, elapsed, now, alpha);
                log::debug!("task_id={} stored {} items in {:?}", task_id, items, elapsed);
            }
            Err(err) => {
                task.record_failure(err, elapsed, now, alpha);
                log::warn!("preload task_id={} failed: {}", task_id, err);
            }
        }

        if let Some((old, new)) = task.optimize_interval(&self.config) {
            log::info!(
                "task_id={} interval {:?} -> {:?} (score {:.2}, success {:.0}%)",
                task_id,
                old,
                new,
                task.performance_score,
                task.success_rate() * 100.0
            );
        }
    }

    /// Dispatch all tasks, then wait for each; loads overlap up to the pool size
    async fn execute_many(&self, ids: &[String]) -> Vec<(String, CacheResult<usize>)> {
        let mut in_flight = Vec::with_capacity(ids.len());
        let mut results = Vec::with_capacity(ids.len());

        for id in ids {
            match self.dispatch(id) {
                Ok(pending) => in_flight.push(pending),
                Err(err) => {
                    log::warn!("could not dispatch task_id={}: {}", id, err);
                    results.push((id.clone(), Err(err)));
                }
            }
        }

        for pending in in_flight {
            let id = pending.task_id.clone();
            let result = self.complete(pending).await;
            results.push((id, result));
        }
        results
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let tasks = self.tasks.read();
        let count_kind = |kind: ScheduleKind| tasks.values().filter(|t| t.schedule == kind).count();
        let average_performance_score = if tasks.is_empty() {
            0.0
        } else {
            tasks.values().map(|t| t.performance_score).sum::<f64>() / tasks.len() as f64
        };
        let counters = self.counters.lock();

        SchedulerStats {
            registered_tasks: tasks.len(),
            startup_tasks: count_kind(ScheduleKind::Startup),
            periodic_tasks: count_kind(ScheduleKind::Periodic),
            demand_tasks: count_kind(ScheduleKind::Demand),
            total_executions: counters.total_executions,
            successful_executions: counters.successful_executions,
            failed_executions: counters.failed_executions,
            timeouts: counters.timeouts,
            items_loaded: counters.items_loaded,
            store_rejections: counters.store_rejections,
            demand_triggers: counters.demand_triggers,
            suppressed_retriggers: counters.suppressed_retriggers,
            refresh_signals_consumed: counters.refresh_signals_consumed,
            dropped_requests: counters.dropped_requests,
            startup_completed: self.startup_completed.load(Ordering::SeqCst),
            average_performance_score,
        }
    }

    /// Spawn the scheduling loop: startup tasks first, then periodic and
    /// demand cycles on their own cadences until `stop` flips
    ///
    /// The stop signal is observed while startup and each cycle are running;
    /// an interrupted cycle abandons its pending results.
    pub fn spawn(self: &Arc<Self>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            log::info!("preload scheduler started");
            if until_stopped(&mut stop, scheduler.run_startup_tasks()).await.is_none() {
                log::info!("preload scheduler stopped during startup");
                return;
            }

            let mut periodic = tokio::time::interval(scheduler.config.periodic_check_interval);
            periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut demand = tokio::time::interval(scheduler.config.demand_poll_interval);
            demand.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let finished = tokio::select! {
                    _ = stopped(&mut stop) => None,
                    _ = periodic.tick() => {
                        until_stopped(&mut stop, scheduler.run_periodic_cycle()).await
                    }
                    _ = demand.tick() => {
                        until_stopped(&mut stop, scheduler.run_demand_cycle()).await
                    }
                };
                if finished.is_none() {
                    break;
                }
            }
            log::info!("preload scheduler stopped");
        })
    }

    /// Stop accepting work and drain the worker pool
    pub async fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            pool.shutdown(self.config.task_timeout).await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
