//! In-memory reference backend.
//!
//! One `Vec` of samples per `"{topic}:{path}"` series behind an async
//! RwLock. Aggregates are computed on demand over the trailing window;
//! good enough for tests, demos, and modest single-process deployments.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{SampleStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    value: f64,
    produced_ms: i64,
}

/// In-memory [`SampleStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, Vec<Sample>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn series_key(topic: &str, path: &str) -> String {
        format!("{topic}:{path}")
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Values of one series within the trailing window, oldest first as
    /// stored.
    async fn window_values(&self, topic: &str, path: &str, window_secs: u64) -> Vec<f64> {
        let cutoff = Self::now_ms() - (window_secs as i64) * 1000;
        let series = self.series.read().await;
        series
            .get(&Self::series_key(topic, path))
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.produced_ms >= cutoff)
                    .map(|s| s.value)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn store(
        &self,
        topic: &str,
        path: &str,
        value: f64,
        timestamp_ms: i64,
    ) -> StoreResult<()> {
        let mut series = self.series.write().await;
        series
            .entry(Self::series_key(topic, path))
            .or_default()
            .push(Sample {
                value,
                produced_ms: timestamp_ms,
            });
        Ok(())
    }

    async fn prune_older_than(
        &self,
        topic: &str,
        path: &str,
        retention_secs: u64,
    ) -> StoreResult<u64> {
        let cutoff = Self::now_ms() - (retention_secs as i64) * 1000;
        let mut series = self.series.write().await;
        let Some(samples) = series.get_mut(&Self::series_key(topic, path)) else {
            return Ok(0);
        };
        let before = samples.len();
        samples.retain(|s| s.produced_ms > cutoff);
        Ok((before - samples.len()) as u64)
    }

    async fn count_in_window(
        &self,
        topic: &str,
        path: &str,
        window_secs: u64,
    ) -> StoreResult<u64> {
        Ok(self.window_values(topic, path, window_secs).await.len() as u64)
    }

    async fn median_in_window(
        &self,
        topic: &str,
        path: &str,
        window_secs: u64,
    ) -> StoreResult<f64> {
        let mut values = self.window_values(topic, path, window_secs).await;
        if values.is_empty() {
            return Ok(0.0);
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 1 {
            values[mid]
        } else {
            (values[mid - 1] + values[mid]) / 2.0
        };
        Ok(median)
    }

    async fn std_dev_in_window(
        &self,
        topic: &str,
        path: &str,
        window_secs: u64,
    ) -> StoreResult<f64> {
        let values = self.window_values(topic, path, window_secs).await;
        if values.is_empty() {
            return Ok(0.0);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Ok(variance.sqrt())
    }

    async fn total_events(&self) -> StoreResult<u64> {
        let series = self.series.read().await;
        Ok(series.values().map(|s| s.len() as u64).sum())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.series.write().await.clear();
        Ok(())
    }
}
