// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rule-driven, rate-limited cache parameter tuning

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::rules::PARAM_STRUCTURE;
use super::{default_rules, AdaptationRule, MetricKind, RuleAction, StrategyConfig, StrategyMode, TunableCache};
use crate::background::{join_with_timeout, spawn_periodic, stop_channel};
use crate::clock::{elapsed_between, system_clock, to_chrono, SharedClock};
use crate::error::{CacheError, CacheResult};
use crate::store::cache_store::{
    PARAM_DEFAULT_TTL_SECS, PARAM_MAX_MEMORY, PARAM_MAX_SIZE, PARAM_TTL_MULTIPLIER,
};
use crate::store::store_config::{MAX_TTL, MAX_TTL_MULTIPLIER, MIN_TTL_MULTIPLIER};
use crate::store::CacheStats;

const RATE_WINDOW: Duration = Duration::from_secs(3600);
const STOP_GRACE: Duration = Duration::from_secs(5);
const RECENT_ADJUSTMENTS: usize = 10;

/// Audit record of one applied adjustment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheAdjustment {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    pub rule: String,
    pub metric: MetricKind,
    pub metric_value: f64,
    /// Filled in once the effectiveness delay has passed
    pub effectiveness_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleStatus {
    pub name: String,
    pub metric: MetricKind,
    pub action: RuleAction,
    pub enabled: bool,
    pub custom: bool,
    pub low_threshold: Option<f64>,
    pub high_threshold: Option<f64>,
    pub adjustment_factor: f64,
    pub max_adjustment: f64,
    pub cooldown: Duration,
    pub last_applied: Option<DateTime<Utc>>,
    pub cooldown_remaining: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub mode: StrategyMode,
    pub running: bool,
    pub evaluations: u64,
    pub total_adjustments: u64,
    pub successful_adjustments: u64,
    pub degraded_adjustments: u64,
    pub rate_limited: u64,
    pub cooldown_skips: u64,
    pub failed_applications: u64,
    pub adjustments_last_hour: usize,
    pub pending_evaluations: usize,
    pub baselines: BTreeMap<String, f64>,
    pub rules: Vec<RuleStatus>,
    pub recent_adjustments: Vec<CacheAdjustment>,
    pub last_evaluation: Option<DateTime<Utc>>,
}

struct PendingEvaluation {
    adjustment_id: Uuid,
    metric: MetricKind,
    due_at: DateTime<Utc>,
    baseline: f64,
}

struct StrategyState {
    mode: StrategyMode,
    rules: Vec<AdaptationRule>,
    baselines: BTreeMap<MetricKind, f64>,
    history: VecDeque<CacheAdjustment>,
    applied_at: VecDeque<DateTime<Utc>>,
    pending: Vec<PendingEvaluation>,
    /// (evictions, requests) at the previous evaluation
    previous_counts: Option<(u64, u64)>,
    evaluations: u64,
    total_adjustments: u64,
    successful_adjustments: u64,
    degraded_adjustments: u64,
    rate_limited: u64,
    cooldown_skips: u64,
    failed_applications: u64,
    last_evaluation: Option<DateTime<Utc>>,
}

struct RunningLoop {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Closed-loop controller over a [`TunableCache`]
pub struct AdaptiveCacheStrategy {
    config: StrategyConfig,
    clock: SharedClock,
    cache: RwLock<Option<Arc<dyn TunableCache>>>,
    state: Mutex<StrategyState>,
    running: Mutex<Option<RunningLoop>>,
}

impl AdaptiveCacheStrategy {
    pub fn new(config: StrategyConfig) -> CacheResult<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: StrategyConfig, clock: SharedClock) -> CacheResult<Self> {
        config.validate()?;
        let rules = build_rules(&config, config.mode);

        Ok(Self {
            clock,
            cache: RwLock::new(None),
            state: Mutex::new(StrategyState {
                mode: config.mode,
                rules,
                baselines: BTreeMap::new(),
                history: VecDeque::new(),
                applied_at: VecDeque::new(),
                pending: Vec::new(),
                previous_counts: None,
                evaluations: 0,
                total_adjustments: 0,
                successful_adjustments: 0,
                degraded_adjustments: 0,
                rate_limited: 0,
                cooldown_skips: 0,
                failed_applications: 0,
                last_evaluation: None,
            }),
            running: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Set the cache evaluated by [`evaluate_and_adapt`](Self::evaluate_and_adapt)
    pub fn attach(&self, cache: Arc<dyn TunableCache>) {
        *self.cache.write() = Some(cache);
    }

    /// Attach `cache` and evaluate it every `evaluation_interval`
    pub fn start(self: &Arc<Self>, cache: Arc<dyn TunableCache>) {
        self.attach(cache);

        let mut running = self.running.lock();
        if running.is_some() {
            log::debug!("adaptive strategy already running");
            return;
        }

        let (stop, stop_rx) = stop_channel();
        let strategy = Arc::clone(self);
        let handle = spawn_periodic(
            "adaptive strategy",
            self.config.evaluation_interval,
            stop_rx,
            move || {
                let strategy = Arc::clone(&strategy);
                async move {
                    strategy.evaluate_and_adapt();
                }
            },
        );

        *running = Some(RunningLoop { stop, handle });
        log::info!("adaptive strategy started in {} mode", self.mode());
    }

    pub async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(RunningLoop { stop, handle }) = running {
            // The loop may already be gone; either way it is stopping
            let _ = stop.send(true);
            join_with_timeout("adaptive strategy", handle, STOP_GRACE).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn mode(&self) -> StrategyMode {
        self.state.lock().mode
    }

    /// Run one evaluation cycle and return the adjustments it applied
    ///
    /// Failures applying an adjustment are logged and counted; they never
    /// abort the cycle.
    pub fn evaluate_and_adapt(&self) -> Vec<CacheAdjustment> {
        let Some(cache) = self.cache.read().clone() else {
            log::debug!("adaptive strategy has no cache attached");
            return Vec::new();
        };

        let now = self.clock.now();
        let stats = cache.snapshot_stats();
        let mut state = self.state.lock();

        let metrics = observe(&stats, state.previous_counts);
        state.previous_counts = Some((stats.evictions, stats.total_requests()));

        self.score_pending(&mut state, &metrics, now);

        while state
            .applied_at
            .front()
            .is_some_and(|at| elapsed_between(*at, now) >= RATE_WINDOW)
        {
            state.applied_at.pop_front();
        }

        let mut applied = Vec::new();
        for index in 0..state.rules.len() {
            let rule = state.rules[index].clone();
            if !rule.enabled {
                continue;
            }
            let Some(&value) = metrics.get(&rule.metric) else {
                continue;
            };
            if !rule.is_triggered(value) {
                continue;
            }

            if rule.in_cooldown(now) {
                state.cooldown_skips += 1;
                log::debug!(
                    "rule={} suppressed by cooldown ({:?} left)",
                    rule.name,
                    rule.cooldown_remaining(now)
                );
                continue;
            }

            if state.applied_at.len() >= self.config.max_adjustments_per_hour {
                state.rate_limited += 1;
                log::info!(
                    "rule={} suppressed: {} adjustments already applied this hour",
                    rule.name,
                    state.applied_at.len()
                );
                continue;
            }

            let baseline = state.baselines.get(&rule.metric).copied().unwrap_or(value);

            match self.apply_rule(cache.as_ref(), &rule, value, &stats, now) {
                Ok(Some(adjustment)) => {
                    log::info!(
                        "adjusted {} {} -> {} (rule={}, {})",
                        adjustment.parameter,
                        adjustment.old_value,
                        adjustment.new_value,
                        adjustment.rule,
                        adjustment.reason
                    );
                    state.rules[index].last_applied = Some(now);
                    state.applied_at.push_back(now);
                    state.total_adjustments += 1;
                    state.pending.push(PendingEvaluation {
                        adjustment_id: adjustment.id,
                        metric: rule.metric,
                        due_at: now + to_chrono(self.config.effectiveness_delay),
                        baseline,
                    });
                    state.history.push_back(adjustment.clone());
                    while state.history.len() > self.config.history_capacity {
                        state.history.pop_front();
                    }
                    applied.push(adjustment);
                }
                Ok(None) => {
                    log::debug!("rule={} triggered but {} is at its bound", rule.name, rule.parameter);
                }
                Err(err) => {
                    state.failed_applications += 1;
                    log::warn!("rule={} could not be applied: {}", rule.name, err);
                }
            }
        }

        let alpha = self.config.baseline_smoothing;
        for (metric, value) in &metrics {
            let baseline = state
                .baselines
                .get(metric)
                .map_or(*value, |baseline| alpha * value + (1.0 - alpha) * baseline);
            state.baselines.insert(*metric, baseline);
        }

        state.evaluations += 1;
        state.last_evaluation = Some(now);
        applied
    }

    fn apply_rule(
        &self,
        cache: &dyn TunableCache,
        rule: &AdaptationRule,
        value: f64,
        stats: &CacheStats,
        now: DateTime<Utc>,
    ) -> CacheResult<Option<CacheAdjustment>> {
        let (old_value, new_value) = match rule.action {
            RuleAction::Optimize => {
                cache.optimize();
                (value, value)
            }
            RuleAction::IncreaseCapacity | RuleAction::DecreaseCapacity => {
                let old = cache.parameter(&rule.parameter).ok_or_else(|| {
                    CacheError::InvalidConfiguration(format!(
                        "unknown store parameter '{}'",
                        rule.parameter
                    ))
                })?;
                let change = rule.change_fraction(value);

                let proposed = if rule.action == RuleAction::IncreaseCapacity {
                    old * (1.0 + change)
                } else if rule.parameter == PARAM_MAX_SIZE {
                    // Shrinking below the live entry count is what frees memory
                    old.min(stats.entry_count as f64) * (1.0 - change)
                } else {
                    old * (1.0 - change)
                };
                let new = self.bound(&rule.parameter, proposed);

                let moved = match rule.action {
                    RuleAction::IncreaseCapacity => new > old,
                    _ => new < old,
                };
                if !moved {
                    return Ok(None);
                }

                cache.apply_parameter(&rule.parameter, new)?;
                (old, new)
            }
        };

        let direction = if rule.low_threshold.is_some_and(|low| value < low) {
            "below"
        } else {
            "above"
        };
        let threshold = match direction {
            "below" => rule.low_threshold,
            _ => rule.high_threshold,
        }
        .unwrap_or_default();

        Ok(Some(CacheAdjustment {
            id: Uuid::new_v4(),
            timestamp: now,
            parameter: if rule.action == RuleAction::Optimize {
                PARAM_STRUCTURE.to_string()
            } else {
                rule.parameter.clone()
            },
            old_value,
            new_value,
            reason: format!(
                "{} {:.4} {} threshold {:.4}",
                rule.metric, value, direction, threshold
            ),
            rule: rule.name.clone(),
            metric: rule.metric,
            metric_value: value,
            effectiveness_score: None,
        }))
    }

    fn bound(&self, parameter: &str, proposed: f64) -> f64 {
        match parameter {
            PARAM_MAX_SIZE => proposed
                .round()
                .clamp(self.config.min_capacity as f64, self.config.max_capacity as f64),
            PARAM_MAX_MEMORY => proposed.round().max(1.0),
            PARAM_TTL_MULTIPLIER => proposed.clamp(MIN_TTL_MULTIPLIER, MAX_TTL_MULTIPLIER),
            PARAM_DEFAULT_TTL_SECS => proposed.round().clamp(1.0, MAX_TTL.as_secs_f64()),
            _ => proposed,
        }
    }

    // Score adjustments whose effectiveness delay has elapsed
    fn score_pending(
        &self,
        state: &mut StrategyState,
        metrics: &BTreeMap<MetricKind, f64>,
        now: DateTime<Utc>,
    ) {
        let pending = std::mem::take(&mut state.pending);
        let mut waiting = Vec::with_capacity(pending.len());

        for evaluation in pending {
            if now < evaluation.due_at {
                waiting.push(evaluation);
                continue;
            }

            let Some(&current) = metrics.get(&evaluation.metric) else {
                log::debug!(
                    "no {} sample to score adjustment {}",
                    evaluation.metric,
                    evaluation.adjustment_id
                );
                continue;
            };

            let score = if evaluation.metric.higher_is_better() {
                current - evaluation.baseline
            } else {
                evaluation.baseline - current
            };

            if score > 0.0 {
                state.successful_adjustments += 1;
            } else if score < 0.0 {
                state.degraded_adjustments += 1;
            }

            if let Some(record) = state
                .history
                .iter_mut()
                .find(|record| record.id == evaluation.adjustment_id)
            {
                record.effectiveness_score = Some(score);
            }

            log::info!(
                "adjustment {} scored {:.4} on {}",
                evaluation.adjustment_id,
                score,
                evaluation.metric
            );
        }

        state.pending = waiting;
    }

    /// Swap the mode, rebuilding built-in rules and keeping custom ones
    pub fn set_mode(&self, mode: StrategyMode) {
        let mut state = self.state.lock();
        let custom: Vec<AdaptationRule> = state.rules.drain(..).filter(|rule| rule.custom).collect();

        let mut rules = build_rules(&self.config, mode);
        rules.retain(|rule| !custom.iter().any(|c| c.name == rule.name));
        rules.extend(custom);

        log::info!("strategy mode {} -> {}", state.mode, mode);
        state.rules = rules;
        state.mode = mode;
    }

    /// Add a rule, replacing any rule of the same name
    pub fn add_custom_rule(&self, mut rule: AdaptationRule) -> CacheResult<()> {
        if rule.low_threshold.is_none() && rule.high_threshold.is_none() {
            return Err(CacheError::InvalidConfiguration(format!(
                "rule {} has no threshold",
                rule.name
            )));
        }
        if rule.adjustment_factor <= 0.0 || rule.max_adjustment <= 0.0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "rule {} needs a positive adjustment factor and maximum",
                rule.name
            )));
        }

        rule.custom = true;
        let mut state = self.state.lock();
        match state.rules.iter_mut().find(|existing| existing.name == rule.name) {
            Some(existing) => *existing = rule,
            None => state.rules.push(rule),
        }
        Ok(())
    }

    pub fn set_rule_enabled(&self, name: &str, enabled: bool) -> CacheResult<()> {
        let mut state = self.state.lock();
        let rule = state
            .rules
            .iter_mut()
            .find(|rule| rule.name == name)
            .ok_or_else(|| CacheError::InvalidConfiguration(format!("unknown rule '{}'", name)))?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn rules(&self) -> Vec<AdaptationRule> {
        self.state.lock().rules.clone()
    }

    /// Full adjustment history, oldest first
    pub fn history(&self) -> Vec<CacheAdjustment> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn get_status(&self) -> StrategyStatus {
        let now = self.clock.now();
        let running = self.is_running();
        let state = self.state.lock();

        StrategyStatus {
            mode: state.mode,
            running,
            evaluations: state.evaluations,
            total_adjustments: state.total_adjustments,
            successful_adjustments: state.successful_adjustments,
            degraded_adjustments: state.degraded_adjustments,
            rate_limited: state.rate_limited,
            cooldown_skips: state.cooldown_skips,
            failed_applications: state.failed_applications,
            adjustments_last_hour: state
                .applied_at
                .iter()
                .filter(|at| elapsed_between(**at, now) < RATE_WINDOW)
                .count(),
            pending_evaluations: state.pending.len(),
            baselines: state
                .baselines
                .iter()
                .map(|(metric, value)| (metric.to_string(), *value))
                .collect(),
            rules: state
                .rules
                .iter()
                .map(|rule| RuleStatus {
                    name: rule.name.clone(),
                    metric: rule.metric,
                    action: rule.action,
                    enabled: rule.enabled,
                    custom: rule.custom,
                    low_threshold: rule.low_threshold,
                    high_threshold: rule.high_threshold,
                    adjustment_factor: rule.adjustment_factor,
                    max_adjustment: rule.max_adjustment,
                    cooldown: rule.cooldown,
                    last_applied: rule.last_applied,
                    cooldown_remaining: rule.cooldown_remaining(now),
                })
                .collect(),
            recent_adjustments: state
                .history
                .iter()
                .rev()
                .take(RECENT_ADJUSTMENTS)
                .cloned()
                .collect(),
            last_evaluation: state.last_evaluation,
        }
    }
}

fn build_rules(config: &StrategyConfig, mode: StrategyMode) -> Vec<AdaptationRule> {
    let mut rules = default_rules(mode);
    for rule in &mut rules {
        if let Some(overrides) = config.rule_overrides.get(&rule.name) {
            overrides.apply_to(rule);
        }
    }
    rules
}

/// Current metric values; metrics without enough data are omitted
fn observe(stats: &CacheStats, previous: Option<(u64, u64)>) -> BTreeMap<MetricKind, f64> {
    let mut metrics = BTreeMap::new();
    let requests = stats.total_requests();

    if requests > 0 {
        metrics.insert(MetricKind::HitRate, stats.hit_rate);
        metrics.insert(MetricKind::AccessTime, stats.average_access_time_ms);
    }
    metrics.insert(MetricKind::MemoryUsage, stats.memory_usage_ratio());

    let (previous_evictions, previous_requests) = previous.unwrap_or((0, 0));
    let request_delta = requests.saturating_sub(previous_requests);
    if request_delta > 0 {
        let eviction_delta = stats.evictions.saturating_sub(previous_evictions);
        metrics.insert(
            MetricKind::EvictionRate,
            eviction_delta as f64 / request_delta as f64,
        );
    }

    metrics
}
