//! Integration tests for the preload scheduler
//!
//! Startup ordering, periodic cadence and both demand triggers (analyzer
//! predictions and near-expiry refresh signals) against a real store.

#[path = "testutils/mod.rs"]
mod testutils;

use cachelite::preload::DYNAMIC_TASK_PREFIX;
use cachelite::{CacheError, Loader, SchedulerConfig, TaskSpec};
use std::sync::Arc;
use std::time::Duration;
use testutils::fixtures::PreloadFixture;
use testutils::loaders::{call_log, FailingLoader, KeyLoader, SlowLoader};

#[tokio::test]
async fn test_startup_runs_dependencies_first() {
    let fixture = PreloadFixture::new();
    let log = call_log();

    let symbols = KeyLoader::new("symbols", &["list:symbols"], Arc::clone(&log));
    let quotes = KeyLoader::new("quotes", &["quote:AAPL"], Arc::clone(&log));
    let calendar = KeyLoader::new("calendar", &["schedule:today"], Arc::clone(&log));

    fixture
        .scheduler
        .register_task(
            "quotes",
            TaskSpec::startup("quote", quotes.shared())
                .with_priority(9)
                .depends_on("symbols"),
        )
        .unwrap();
    fixture
        .scheduler
        .register_task("symbols", TaskSpec::startup("list", symbols.shared()).with_priority(1))
        .unwrap();
    fixture
        .scheduler
        .register_task("calendar", TaskSpec::startup("schedule", calendar.shared()).with_priority(5))
        .unwrap();

    let report = fixture.scheduler.run_startup_tasks().await;

    assert_eq!(report.executed, vec!["calendar", "symbols", "quotes"]);
    assert!(report.forced.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(log.lock().last().map(String::as_str), Some("quotes"));

    assert!(fixture.store.exists("quote:AAPL"));
    assert!(fixture.store.exists("list:symbols"));
    assert!(fixture.scheduler.get_stats().startup_completed);
}

#[tokio::test]
async fn test_startup_cycle_is_broken_by_forcing() {
    let fixture = PreloadFixture::new();
    let log = call_log();

    fixture
        .scheduler
        .register_task(
            "x",
            TaskSpec::startup("quote", KeyLoader::new("x", &["quote:x"], Arc::clone(&log)).shared())
                .depends_on("y"),
        )
        .unwrap();
    fixture
        .scheduler
        .register_task(
            "y",
            TaskSpec::startup("quote", KeyLoader::new("y", &["quote:y"], Arc::clone(&log)).shared())
                .depends_on("x"),
        )
        .unwrap();

    let report = fixture.scheduler.run_startup_tasks().await;

    assert_eq!(report.forced, vec!["x"]);
    assert_eq!(report.executed, vec!["x", "y"]);
    assert_eq!(*log.lock(), vec!["x", "y"]);
}

#[tokio::test]
async fn test_failing_startup_task_does_not_block_others() {
    let fixture = PreloadFixture::new();
    let failing: Arc<dyn Loader<String>> = Arc::new(FailingLoader);

    fixture
        .scheduler
        .register_task("broken", TaskSpec::startup("quote", failing).with_priority(8))
        .unwrap();
    fixture
        .scheduler
        .register_task(
            "lists",
            TaskSpec::startup("list", KeyLoader::new("lists", &["list:top"], call_log()).shared())
                .depends_on("broken"),
        )
        .unwrap();

    let report = fixture.scheduler.run_startup_tasks().await;

    assert_eq!(report.failed, vec!["broken"]);
    assert!(fixture.store.exists("list:top"));

    let broken = fixture.scheduler.task_info("broken").unwrap();
    assert_eq!(broken.failure_count, 1);
    assert!(broken.last_error.unwrap().contains("backend unavailable"));
    assert_eq!(fixture.scheduler.get_stats().failed_executions, 1);
}

#[tokio::test]
async fn test_periodic_task_runs_on_its_interval() {
    let fixture = PreloadFixture::new();
    let loader = KeyLoader::new("quotes", &["quote:AAPL", "quote:MSFT"], call_log());

    fixture
        .scheduler
        .register_task(
            "quotes",
            TaskSpec::periodic("quote", loader.shared(), Duration::from_secs(60)),
        )
        .unwrap();

    assert_eq!(fixture.scheduler.run_periodic_cycle().await, 1);
    assert_eq!(fixture.scheduler.run_periodic_cycle().await, 0);

    fixture.clock.advance(Duration::from_secs(61));
    assert_eq!(fixture.scheduler.run_periodic_cycle().await, 1);
    assert_eq!(loader.calls(), 2);

    let info = fixture.store.entry_info("quote:AAPL").unwrap();
    assert_eq!(info.ttl, Some(Duration::from_secs(60)));
    assert_eq!(fixture.scheduler.get_stats().items_loaded, 4);
}

#[tokio::test]
async fn test_predicted_key_is_prefetched_by_dynamic_task() {
    let fixture = PreloadFixture::new();
    let loader = KeyLoader::new("quotes", &["quote:AAPL"], call_log());
    fixture.scheduler.register_loader("quote", loader.shared());

    for i in 0..10 {
        if i > 0 {
            fixture.clock.advance(Duration::from_secs(60));
        }
        fixture.analyzer.record_access("quote:AAPL", "quote", None);
    }

    assert_eq!(fixture.scheduler.run_demand_cycle().await, 1);
    assert!(fixture.store.exists("quote:AAPL"));

    let task_id = format!("{}quote", DYNAMIC_TASK_PREFIX);
    let info = fixture.scheduler.task_info(&task_id).unwrap();
    assert!(info.dynamic);
    assert_eq!(info.success_count, 1);

    // Within the key's average interval the prefetch is not repeated
    assert_eq!(fixture.scheduler.run_demand_cycle().await, 0);
    let stats = fixture.scheduler.get_stats();
    assert_eq!(stats.demand_triggers, 1);
    assert_eq!(stats.suppressed_retriggers, 1);
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn test_near_expiry_key_is_refreshed() {
    let fixture = PreloadFixture::new();
    let loader = KeyLoader::new("lists", &["list:top"], call_log());
    fixture
        .scheduler
        .register_task(
            "lists",
            TaskSpec::demand("list", loader.shared()).with_key_pattern("list:*"),
        )
        .unwrap();

    fixture
        .store
        .set("list:top", "stale".to_string(), Some(Duration::from_secs(100)), None)
        .unwrap();
    fixture.clock.advance(Duration::from_secs(95));
    assert!(fixture.store.get("list:top").is_some());

    assert_eq!(fixture.scheduler.run_demand_cycle().await, 1);

    let value = fixture.store.get("list:top").unwrap();
    assert_eq!(value.as_str(), "list:top@lists");
    let info = fixture.store.entry_info("list:top").unwrap();
    assert_eq!(info.created_at, fixture.clock.now());
    assert_eq!(info.ttl, Some(Duration::from_secs(3600)));
    assert_eq!(fixture.scheduler.get_stats().refresh_signals_consumed, 1);
}

#[tokio::test]
async fn test_unmatched_demand_key_is_ignored() {
    let fixture = PreloadFixture::new();
    let loader = KeyLoader::new("lists", &["list:top"], call_log());
    fixture
        .scheduler
        .register_task(
            "lists",
            TaskSpec::demand("list", loader.shared()).with_key_pattern("list:top*"),
        )
        .unwrap();

    fixture
        .store
        .set("list:other", "v".to_string(), Some(Duration::from_secs(100)), None)
        .unwrap();
    fixture.clock.advance(Duration::from_secs(95));
    fixture.store.get("list:other");

    assert_eq!(fixture.scheduler.run_demand_cycle().await, 0);
    assert_eq!(loader.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_loader_times_out() {
    let fixture = PreloadFixture::with_config(SchedulerConfig {
        task_timeout: Duration::from_millis(50),
        ..SchedulerConfig::default()
    });
    let slow: Arc<dyn Loader<String>> = Arc::new(SlowLoader {
        delay: Duration::from_secs(5),
    });
    fixture
        .scheduler
        .register_task("slow", TaskSpec::startup("quote", slow))
        .unwrap();

    let result = fixture.scheduler.force_execute("slow").await;

    assert!(matches!(result, Err(CacheError::LoadTimeout { .. })));
    assert!(!fixture.store.exists("quote:slow"));
    assert_eq!(fixture.scheduler.get_stats().timeouts, 1);
}

#[tokio::test]
async fn test_shutdown_rejects_new_work() {
    let fixture = PreloadFixture::new();
    fixture
        .scheduler
        .register_task(
            "quotes",
            TaskSpec::startup("quote", KeyLoader::new("q", &["quote:A"], call_log()).shared()),
        )
        .unwrap();

    assert_eq!(fixture.scheduler.force_execute("quotes").await.unwrap(), 1);
    fixture.scheduler.shutdown().await;

    assert!(matches!(
        fixture.scheduler.force_execute("quotes").await,
        Err(CacheError::SchedulerStopped)
    ));
    assert!(matches!(
        fixture.scheduler.unregister_task("missing"),
        Err(CacheError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_demand_cycle_fires_top_n_by_score() {
    let fixture = PreloadFixture::with_config(SchedulerConfig {
        concurrency_limit: 1,
        ..SchedulerConfig::default()
    });
    let log = call_log();
    let base = fixture.clock.now();

    // Seven steady readers; shorter intervals mean higher velocity and score
    let keys: Vec<String> = (0..7).map(|i| format!("quote:{}", i)).collect();
    for (i, key) in keys.iter().enumerate() {
        let interval = chrono::Duration::seconds(5 * (i as i64 + 1));
        for n in 0..10 {
            fixture
                .analyzer
                .record_access(key, "quote", Some(base + interval * n));
        }

        let loader = KeyLoader::new(key, &[key.as_str()], Arc::clone(&log));
        fixture
            .scheduler
            .register_task(
                format!("refresh-{}", i),
                TaskSpec::demand("quote", loader.shared()).with_key_pattern(key.as_str()),
            )
            .unwrap();
    }
    fixture.clock.advance(Duration::from_secs(200));

    let ranked: Vec<String> = fixture
        .analyzer
        .preload_candidates(fixture.clock.now(), 10)
        .into_iter()
        .map(|candidate| candidate.key)
        .collect();
    assert_eq!(ranked, keys);

    let top_n = fixture.scheduler.config().demand_top_n;
    assert_eq!(top_n, 5);
    assert_eq!(fixture.scheduler.run_demand_cycle().await, top_n);

    // One worker runs the loads in dispatch order
    assert_eq!(*log.lock(), keys[..top_n].to_vec());
    assert_eq!(fixture.scheduler.get_stats().demand_triggers, top_n as u64);
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(fixture.store.exists(key), i < top_n, "{}", key);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_startup() {
    let fixture = PreloadFixture::new();
    let slow: Arc<dyn Loader<String>> = Arc::new(SlowLoader {
        delay: Duration::from_secs(25),
    });
    fixture
        .scheduler
        .register_task("warm", TaskSpec::startup("quote", slow))
        .unwrap();

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let handle = fixture.scheduler.spawn(stop_rx);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let started = tokio::time::Instant::now();
    stop_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!fixture.scheduler.get_stats().startup_completed);

    fixture.scheduler.shutdown().await;
    assert!(!fixture.store.exists("quote:slow"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_periodic_cycle() {
    let fixture = PreloadFixture::new();
    let slow: Arc<dyn Loader<String>> = Arc::new(SlowLoader {
        delay: Duration::from_secs(25),
    });
    fixture
        .scheduler
        .register_task(
            "refresh",
            TaskSpec::periodic("quote", slow, Duration::from_secs(60)),
        )
        .unwrap();

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let handle = fixture.scheduler.spawn(stop_rx);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(fixture.scheduler.get_stats().startup_completed);

    let started = tokio::time::Instant::now();
    stop_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(fixture.scheduler.get_stats().total_executions, 0);

    fixture.scheduler.shutdown().await;
}
