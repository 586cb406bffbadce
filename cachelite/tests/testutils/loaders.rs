//! Loader doubles

#![allow(dead_code)]

use async_trait::async_trait;
use cachelite::{CacheError, CacheResult, LoadedItem, Loader};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared call log, in call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Returns fixed keys and records each call under `name`
pub struct KeyLoader {
    name: String,
    keys: Vec<String>,
    log: CallLog,
    calls: AtomicUsize,
}

impl KeyLoader {
    pub fn new(name: &str, keys: &[&str], log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            log,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn shared(self: &Arc<Self>) -> Arc<dyn Loader<String>> {
        Arc::clone(self) as Arc<dyn Loader<String>>
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader<String> for KeyLoader {
    async fn load(&self, _data_type: &str) -> CacheResult<Vec<LoadedItem<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(self.name.clone());
        Ok(self
            .keys
            .iter()
            .map(|key| LoadedItem::new(key.clone(), format!("{}@{}", key, self.name)))
            .collect())
    }
}

/// Always fails
pub struct FailingLoader;

#[async_trait]
impl Loader<String> for FailingLoader {
    async fn load(&self, data_type: &str) -> CacheResult<Vec<LoadedItem<String>>> {
        Err(CacheError::LoadError(format!("{} backend unavailable", data_type)))
    }
}

/// Sleeps before answering
pub struct SlowLoader {
    pub delay: Duration,
}

#[async_trait]
impl Loader<String> for SlowLoader {
    async fn load(&self, data_type: &str) -> CacheResult<Vec<LoadedItem<String>>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![LoadedItem::new(format!("{}:slow", data_type), "late".to_string())])
    }
}
