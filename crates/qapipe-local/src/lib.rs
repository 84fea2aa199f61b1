use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub mod agent;
pub mod bench;
pub mod calculator;
pub mod llm;
pub mod search;
pub mod tabular;

/// In-memory store of downloaded file bytes keyed by task identifier.
///
/// Unbounded on purpose: the cache lives for one batch run. Clones share the
/// same store, so a single instance can be handed to the agent and inspected
/// from tests.
#[derive(Debug, Clone, Default)]
pub struct FileCache {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .cloned()
    }

    pub fn put(&self, task_id: &str, bytes: Vec<u8>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
