//! Component fixtures on a manual clock

#![allow(dead_code)]

use cachelite::analyzer::AnalyzerConfig;
use cachelite::{
    AccessPatternAnalyzer, CacheStore, EngineConfig, ManualClock, PredictiveCache,
    PreloadScheduler, SchedulerConfig, StoreConfig,
};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn store(config: StoreConfig, clock: &ManualClock) -> Arc<CacheStore<String>> {
    Arc::new(CacheStore::with_clock(config, Arc::new(clock.clone())).expect("valid store config"))
}

/// Store, analyzer and scheduler sharing one clock
pub struct PreloadFixture {
    pub clock: ManualClock,
    pub store: Arc<CacheStore<String>>,
    pub analyzer: Arc<AccessPatternAnalyzer>,
    pub scheduler: Arc<PreloadScheduler<String>>,
}

impl PreloadFixture {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        init_logging();
        let clock = ManualClock::starting_now();
        let store = store(StoreConfig::default(), &clock);
        let analyzer = Arc::new(
            AccessPatternAnalyzer::with_clock(AnalyzerConfig::default(), Arc::new(clock.clone()))
                .expect("valid analyzer config"),
        );
        let scheduler = Arc::new(
            PreloadScheduler::new(config, Arc::clone(&store), Arc::clone(&analyzer))
                .expect("valid scheduler config"),
        );

        Self {
            clock,
            store,
            analyzer,
            scheduler,
        }
    }
}

pub fn engine(config: EngineConfig) -> (PredictiveCache<String>, ManualClock) {
    init_logging();
    let clock = ManualClock::starting_now();
    let engine = PredictiveCache::with_clock(config, Arc::new(clock.clone()))
        .expect("valid engine config");
    (engine, clock)
}
