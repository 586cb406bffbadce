// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fixed-size pool of loader workers fed by a bounded queue

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use super::{LoadedItem, Loader};
use crate::error::{CacheError, CacheResult};

/// Result of one loader execution
#[derive(Debug)]
pub struct LoadOutcome<V> {
    pub task_id: String,
    pub result: CacheResult<Vec<LoadedItem<V>>>,
    pub elapsed: Duration,
}

struct LoadRequest<V> {
    task_id: String,
    data_type: String,
    loader: Arc<dyn Loader<V>>,
    timeout: Duration,
    respond_to: oneshot::Sender<LoadOutcome<V>>,
}

type SharedQueue<V> = Arc<tokio::sync::Mutex<mpsc::Receiver<LoadRequest<V>>>>;

/// Bounded loader execution
///
/// `size` workers pull requests from one queue, so at most `size` loader
/// calls are in flight. Each call is cancelled once it exceeds its timeout.
/// After shutdown, queued requests are answered with
/// [`CacheError::SchedulerStopped`] without running their loader.
pub struct WorkerPool<V> {
    sender: Mutex<Option<mpsc::Sender<LoadRequest<V>>>>,
    workers: Mutex<JoinSet<()>>,
    closing: Arc<AtomicBool>,
    size: usize,
}

impl<V: Send + 'static> WorkerPool<V> {
    /// Spawn the workers; must be called inside a tokio runtime
    pub fn start(size: usize, queue_capacity: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let queue: SharedQueue<V> = Arc::new(tokio::sync::Mutex::new(receiver));

        let closing = Arc::new(AtomicBool::new(false));

        let mut workers = JoinSet::new();
        for worker_id in 0..size {
            workers.spawn(worker_loop(worker_id, Arc::clone(&queue), Arc::clone(&closing)));
        }

        log::debug!("worker pool started with {} workers", size);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            closing,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a loader call; the receiver resolves when it finishes
    pub fn submit(
        &self,
        task_id: &str,
        data_type: &str,
        loader: Arc<dyn Loader<V>>,
        timeout: Duration,
    ) -> CacheResult<oneshot::Receiver<LoadOutcome<V>>> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(CacheError::SchedulerStopped)?;

        let (respond_to, response) = oneshot::channel();
        let request = LoadRequest {
            task_id: task_id.to_string(),
            data_type: data_type.to_string(),
            loader,
            timeout,
            respond_to,
        };

        match sender.try_send(request) {
            Ok(()) => Ok(response),
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("preload queue full, dropped task_id={}", task_id);
                Err(CacheError::LoadError(format!(
                    "preload queue full, task {} dropped",
                    task_id
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CacheError::SchedulerStopped),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Close the queue, drop pending requests and give in-flight loads
    /// `grace` in total to finish
    pub async fn shutdown(&self, grace: Duration) {
        self.closing.store(true, Ordering::SeqCst);
        self.sender.lock().take();

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    log::warn!("preload worker ended abnormally: {}", err);
                }
            }
        })
        .await;

        if drained.is_err() {
            log::warn!(
                "{} preload workers did not stop within {:?}, aborting",
                workers.len(),
                grace
            );
            workers.abort_all();
        }
    }
}

async fn worker_loop<V: Send + 'static>(
    worker_id: usize,
    queue: SharedQueue<V>,
    closing: Arc<AtomicBool>,
) {
    loop {
        let request = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(request) = request else {
            break;
        };

        if closing.load(Ordering::SeqCst) {
            log::debug!("worker={} dropping queued task_id={}", worker_id, request.task_id);
            let _ = request.respond_to.send(LoadOutcome {
                task_id: request.task_id,
                result: Err(CacheError::SchedulerStopped),
                elapsed: Duration::ZERO,
            });
            continue;
        }

        let started = Instant::now();
        let result = match tokio::time::timeout(
            request.timeout,
            request.loader.load(&request.data_type),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CacheError::LoadTimeout {
                task_id: request.task_id.clone(),
                timeout: request.timeout,
            }),
        };

        log::debug!(
            "worker={} task_id={} finished in {:?} ok={}",
            worker_id,
            request.task_id,
            started.elapsed(),
            result.is_ok()
        );

        // The submitter may have gone away; nothing to report to
        let _ = request.respond_to.send(LoadOutcome {
            task_id: request.task_id,
            result,
            elapsed: started.elapsed(),
        });
    }
    log::debug!("worker={} exiting", worker_id);
}
