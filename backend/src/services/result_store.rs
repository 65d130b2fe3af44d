use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::models::ResultItem;
use crate::utils::error::{EngineError, EngineResult};

/// Key identifying one collector outcome: metric name plus an optional node
/// id (`None` for cluster-level metrics).
pub type ResultKey = (String, Option<String>);

/// Accumulates result items keyed by `(metric, node)`. Writes are
/// serialized behind a single mutex; once a key is written it can never be
/// written again (write-once per pair, per §9's resolved ambiguity around
/// `fillResult`/`fillResults`).
#[derive(Debug, Default)]
pub struct ResultStore {
    items: Mutex<HashMap<ResultKey, ResultItem>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: ResultItem) -> EngineResult<()> {
        let key = (item.metric.clone(), item.node_id.clone());
        let mut guard = self.items.lock().await;
        if guard.contains_key(&key) {
            return Err(EngineError::config_invalid(format!(
                "duplicate result write for metric={} node={:?}",
                key.0, key.1
            )));
        }
        guard.insert(key, item);
        Ok(())
    }

    pub async fn update(&self, key: &ResultKey, item: ResultItem) {
        let mut guard = self.items.lock().await;
        guard.insert(key.clone(), item);
    }

    pub async fn snapshot(&self) -> Vec<ResultItem> {
        self.items.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, key: &ResultKey) -> Option<ResultItem> {
        self.items.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}
