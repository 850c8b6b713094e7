//! The shared baseline table.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::RwLock;

/// One cached baseline. An entry exists only while the last scan saw
/// enough samples and non-zero statistics for its triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub median: f64,
    pub std_dev: f64,
}

/// Cache key for a (topic, field path, window seconds) triple.
pub fn baseline_key(topic: &str, path: &str, window_secs: u64) -> String {
    format!("{topic}:{path}:{window_secs}")
}

/// Baseline table shared between the scanner (sole writer) and the
/// evaluator (reader).
#[derive(Debug, Default)]
pub struct BaselineCache {
    entries: RwLock<HashMap<String, Baseline>>,
}

impl BaselineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, topic: &str, path: &str, window_secs: u64) -> Option<Baseline> {
        self.entries
            .read()
            .await
            .get(&baseline_key(topic, path, window_secs))
            .copied()
    }

    pub async fn insert(&self, topic: &str, path: &str, window_secs: u64, baseline: Baseline) {
        self.entries
            .write()
            .await
            .insert(baseline_key(topic, path, window_secs), baseline);
    }

    /// Remove a triple's entry. Returns whether one existed.
    pub async fn remove(&self, topic: &str, path: &str, window_secs: u64) -> bool {
        self.entries
            .write()
            .await
            .remove(&baseline_key(topic, path, window_secs))
            .is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Sorted copy for the status surface.
    pub async fn snapshot(&self) -> BTreeMap<String, Baseline> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}
