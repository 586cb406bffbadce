// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cancellable periodic background loops

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Stop signal shared by a group of loops
pub(crate) fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once `stop` flips to `true` or its sender drops
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    // A closed channel counts as a stop
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Drive `work` to completion unless `stop` fires first
///
/// Returns `None` when the work was cut short; dropping it cancels any
/// await point it was parked on.
pub(crate) async fn until_stopped<F: Future>(
    stop: &mut watch::Receiver<bool>,
    work: F,
) -> Option<F::Output> {
    tokio::select! {
        _ = stopped(stop) => None,
        output = work => Some(output),
    }
}

/// Run `tick` every `period` until `stop` flips to `true` or its sender drops
///
/// The first tick fires one period after spawning. Each tick runs as its own
/// task; a panicking tick is logged and the next one still fires. A tick in
/// progress is awaited to completion.
pub(crate) fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        log::info!("{} loop started (every {:?})", name, period);

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stopped(&mut stop) => break,
                _ = ticker.tick() => {
                    if let Err(err) = tokio::spawn(tick()).await {
                        log::error!("{} iteration failed: {}", name, err);
                    }
                }
            }
        }

        log::info!("{} loop stopped", name);
    })
}

/// Await a loop handle, aborting it if it does not finish within `grace`
pub(crate) async fn join_with_timeout(name: &str, mut handle: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("{} loop ended abnormally: {}", name, err),
        Err(_) => {
            log::warn!("{} loop did not stop within {:?}, aborting", name, grace);
            handle.abort();
        }
    }
}
