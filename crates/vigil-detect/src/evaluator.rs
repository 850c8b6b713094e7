//! Per-message scoring against the baseline cache.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tracing::{debug, trace};

use vigil_baseline::BaselineCache;
use vigil_core::{Anomaly, StreamMessage, stable_hash};
use vigil_dsl::{CompiledDsl, FieldRule, WindowSpec};
use vigil_store::SampleStore;

use crate::cooldown::CooldownCache;
use crate::error::{DetectError, DetectResult};

/// Everything one message produced: accepted anomalies plus per-field
/// failures for the error surface.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub anomalies: Vec<Anomaly>,
    pub failures: Vec<DetectError>,
}

impl Evaluation {
    pub fn is_quiet(&self) -> bool {
        self.anomalies.is_empty() && self.failures.is_empty()
    }
}

/// Scores messages against cached baselines and suppresses repeats.
///
/// Holds the sample store only to persist extracted values; every
/// statistic it scores against comes out of the [`BaselineCache`].
pub struct Evaluator {
    store: Arc<dyn SampleStore>,
    baselines: Arc<BaselineCache>,
    cooldowns: CooldownCache,
}

impl Evaluator {
    pub fn new(
        store: Arc<dyn SampleStore>,
        baselines: Arc<BaselineCache>,
        cooldown_ttl: Duration,
    ) -> Self {
        Self {
            store,
            baselines,
            cooldowns: CooldownCache::new(cooldown_ttl),
        }
    }

    /// Evaluate one message against the given table snapshot.
    ///
    /// Fields fan out concurrently, then each field's windows fan out. A
    /// field that fails to persist reports a failure and skips its
    /// windows; the other fields are unaffected.
    pub async fn evaluate(&self, dsl: &CompiledDsl, message: &StreamMessage) -> Evaluation {
        let mut evaluation = Evaluation::default();
        if message.topic.is_empty() || message.payload.is_null() {
            return evaluation;
        }
        let Some(rules) = dsl.rules_for(&message.topic) else {
            return evaluation;
        };
        if rules.is_empty() {
            return evaluation;
        }

        let results = future::join_all(
            rules
                .iter()
                .map(|rule| self.evaluate_field(rule, message)),
        )
        .await;
        for result in results {
            match result {
                Ok(mut anomalies) => evaluation.anomalies.append(&mut anomalies),
                Err(failure) => evaluation.failures.push(failure),
            }
        }
        evaluation
    }

    /// Extract, persist once, then score every window of the field.
    async fn evaluate_field(
        &self,
        rule: &FieldRule,
        message: &StreamMessage,
    ) -> DetectResult<Vec<Anomaly>> {
        let Some(value) = message.payload.number_at(&rule.path) else {
            trace!(topic = %message.topic, path = %rule.path, "field missing or not numeric, skipped");
            return Ok(Vec::new());
        };

        self.store
            .store(&message.topic, &rule.path, value, message.timestamp_ms)
            .await
            .map_err(|source| DetectError::Persist {
                topic: message.topic.clone(),
                path: rule.path.clone(),
                source,
            })?;

        let verdicts = future::join_all(
            rule.windows
                .iter()
                .map(|window| self.check_window(rule, window, value, message)),
        )
        .await;
        Ok(verdicts.into_iter().flatten().collect())
    }

    async fn check_window(
        &self,
        rule: &FieldRule,
        window: &WindowSpec,
        value: f64,
        message: &StreamMessage,
    ) -> Option<Anomaly> {
        let baseline = self
            .baselines
            .get(&message.topic, &rule.path, window.secs)
            .await?;

        let score = (value - baseline.median) / (3.0 * baseline.std_dev);
        if !score.is_finite() {
            trace!(topic = %message.topic, path = %rule.path, window = %window.label, "non-finite score, skipped");
            return None;
        }
        // Strictly outside the band: exactly 3 sigma is still normal.
        if (-1.0..=1.0).contains(&score) {
            return None;
        }

        let window_secs = window.secs.to_string();
        let key = stable_hash(&[&message.topic, &rule.path, &window_secs]);
        if !self.cooldowns.acquire(&key).await {
            debug!(topic = %message.topic, path = %rule.path, window = %window.label, "anomaly suppressed by cooldown");
            return None;
        }

        let timestamp = message.timestamp_ms.to_string();
        let anomaly = Anomaly {
            id: stable_hash(&[&key, &timestamp]),
            topic: message.topic.clone(),
            field_path: rule.path.clone(),
            window_secs: window.secs,
            window_label: window.label.clone(),
            value,
            median: baseline.median,
            std_dev: baseline.std_dev,
            score,
            message: message.clone(),
        };
        debug!(
            topic = %anomaly.topic,
            path = %anomaly.field_path,
            window = %anomaly.window_label,
            value = anomaly.value,
            score = anomaly.score,
            "anomaly detected"
        );
        Some(anomaly)
    }

    /// Suppression entries currently armed.
    pub async fn cooldowns_active(&self) -> usize {
        self.cooldowns.active_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use serde_json::json;

    use vigil_baseline::Baseline;
    use vigil_core::Payload;
    use vigil_dsl::{AnalysisConfig, FieldEntry, TopicEntry};
    use vigil_store::{MemoryStore, StoreError, StoreResult};

    fn dsl(entries: &[(&str, &[&str])]) -> CompiledDsl {
        let mut fields = BTreeMap::new();
        for (path, windows) in entries {
            fields.insert(path.to_string(), FieldEntry::new(windows.iter().copied()));
        }
        let mut topics = BTreeMap::new();
        topics.insert(
            "orders".to_string(),
            TopicEntry {
                fields: Some(fields),
            },
        );
        CompiledDsl::compile(&AnalysisConfig { topics })
    }

    async fn baselines_with(entries: &[(&str, u64, f64, f64)]) -> Arc<BaselineCache> {
        let cache = Arc::new(BaselineCache::new());
        for (path, secs, median, std_dev) in entries {
            cache
                .insert(
                    "orders",
                    path,
                    *secs,
                    Baseline {
                        median: *median,
                        std_dev: *std_dev,
                    },
                )
                .await;
        }
        cache
    }

    fn msg(value: f64, timestamp_ms: i64) -> StreamMessage {
        StreamMessage::new(
            "orders",
            Payload::from_json(json!({"amount": value})),
            timestamp_ms,
        )
    }

    #[tokio::test]
    async fn score_must_be_strictly_outside_the_band() {
        // Baseline 100 ± 10: the band edge sits exactly at 130 and 70.
        let cases = [
            (131.0, true),
            (130.0, false),
            (129.0, false),
            (70.0, false),
            (69.0, true),
        ];
        let dsl = dsl(&[("amount", &["1m"])]);
        for (value, expect_anomaly) in cases {
            let baselines = baselines_with(&[("amount", 60, 100.0, 10.0)]).await;
            let evaluator = Evaluator::new(
                Arc::new(MemoryStore::new()),
                baselines,
                Duration::from_secs(60),
            );
            let evaluation = evaluator.evaluate(&dsl, &msg(value, 1_000)).await;
            assert_eq!(
                !evaluation.anomalies.is_empty(),
                expect_anomaly,
                "value {value}"
            );
            assert!(evaluation.failures.is_empty());
        }
    }

    #[tokio::test]
    async fn anomaly_carries_the_scoring_context() {
        let baselines = baselines_with(&[("amount", 60, 100.0, 10.0)]).await;
        let evaluator = Evaluator::new(
            Arc::new(MemoryStore::new()),
            baselines,
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m"])]);

        let evaluation = evaluator.evaluate(&dsl, &msg(131.0, 42_000)).await;
        let anomaly = &evaluation.anomalies[0];
        assert_eq!(anomaly.topic, "orders");
        assert_eq!(anomaly.field_path, "amount");
        assert_eq!(anomaly.window_secs, 60);
        assert_eq!(anomaly.window_label, "1m");
        assert_eq!(anomaly.value, 131.0);
        assert_eq!(anomaly.median, 100.0);
        assert_eq!(anomaly.std_dev, 10.0);
        assert!((anomaly.score - 31.0 / 30.0).abs() < 1e-9);
        assert_eq!(anomaly.message.timestamp_ms, 42_000);
        assert!(!anomaly.id.is_empty());
    }

    #[tokio::test]
    async fn values_persist_even_while_the_triple_is_cold() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = Evaluator::new(
            Arc::clone(&store) as _,
            Arc::new(BaselineCache::new()),
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m"])]);

        let evaluation = evaluator.evaluate(&dsl, &msg(131.0, vigil_core::epoch_millis())).await;
        assert!(evaluation.is_quiet());
        assert_eq!(
            store.count_in_window("orders", "amount", 60).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn one_write_per_message_regardless_of_window_count() {
        let store = Arc::new(MemoryStore::new());
        let baselines = baselines_with(&[
            ("amount", 60, 100.0, 10.0),
            ("amount", 900, 100.0, 10.0),
        ])
        .await;
        let evaluator = Evaluator::new(Arc::clone(&store) as _, baselines, Duration::from_secs(60));
        let dsl = dsl(&[("amount", &["1m", "15m"])]);

        let evaluation = evaluator
            .evaluate(&dsl, &msg(131.0, vigil_core::epoch_millis()))
            .await;
        // Both windows violate independently.
        assert_eq!(evaluation.anomalies.len(), 2);
        assert_eq!(store.total_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cooldown_suppresses_then_releases() {
        let baselines = baselines_with(&[("amount", 60, 100.0, 10.0)]).await;
        let evaluator = Evaluator::new(
            Arc::new(MemoryStore::new()),
            baselines,
            Duration::from_millis(50),
        );
        let dsl = dsl(&[("amount", &["1m"])]);

        let first = evaluator.evaluate(&dsl, &msg(131.0, 1_000)).await;
        assert_eq!(first.anomalies.len(), 1);

        let second = evaluator.evaluate(&dsl, &msg(135.0, 2_000)).await;
        assert!(second.anomalies.is_empty(), "within cooldown");

        tokio::time::sleep(Duration::from_millis(80)).await;
        let third = evaluator.evaluate(&dsl, &msg(140.0, 3_000)).await;
        assert_eq!(third.anomalies.len(), 1);
        // Same triple, new timestamp: a distinct anomaly identity.
        assert_ne!(first.anomalies[0].id, third.anomalies[0].id);
    }

    #[tokio::test]
    async fn windows_of_one_field_suppress_independently() {
        let baselines = baselines_with(&[
            ("amount", 60, 100.0, 10.0),
            ("amount", 900, 100.0, 10.0),
        ])
        .await;
        let evaluator = Evaluator::new(
            Arc::new(MemoryStore::new()),
            baselines,
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m", "15m"])]);

        let first = evaluator.evaluate(&dsl, &msg(131.0, 1_000)).await;
        assert_eq!(first.anomalies.len(), 2);
        assert_eq!(evaluator.cooldowns_active().await, 2);
    }

    #[tokio::test]
    async fn missing_field_skips_quietly() {
        let baselines = baselines_with(&[("amount", 60, 100.0, 10.0)]).await;
        let store = Arc::new(MemoryStore::new());
        let evaluator = Evaluator::new(Arc::clone(&store) as _, baselines, Duration::from_secs(60));
        let dsl = dsl(&[("amount", &["1m"]), ("missing.path", &["1m"])]);

        let evaluation = evaluator.evaluate(&dsl, &msg(131.0, 1_000)).await;
        assert_eq!(evaluation.anomalies.len(), 1);
        assert!(evaluation.failures.is_empty());
        assert_eq!(store.total_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_std_dev_baseline_scores_nothing() {
        let baselines = baselines_with(&[("amount", 60, 100.0, 0.0)]).await;
        let evaluator = Evaluator::new(
            Arc::new(MemoryStore::new()),
            baselines,
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m"])]);

        let evaluation = evaluator.evaluate(&dsl, &msg(131.0, 1_000)).await;
        assert!(evaluation.is_quiet());
    }

    #[tokio::test]
    async fn unknown_topic_and_null_payload_are_quiet() {
        let evaluator = Evaluator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BaselineCache::new()),
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m"])]);

        let other = StreamMessage::new("payments", Payload::from_json(json!({"amount": 1.0})), 1_000);
        assert!(evaluator.evaluate(&dsl, &other).await.is_quiet());

        let null = StreamMessage::new("orders", Payload::Null, 1_000);
        assert!(evaluator.evaluate(&dsl, &null).await.is_quiet());
    }

    struct FailingPathStore {
        inner: MemoryStore,
        fail_path: &'static str,
    }

    #[async_trait]
    impl SampleStore for FailingPathStore {
        async fn store(&self, topic: &str, path: &str, value: f64, timestamp_ms: i64) -> StoreResult<()> {
            if path == self.fail_path {
                return Err(StoreError::Backend("write refused".into()));
            }
            self.inner.store(topic, path, value, timestamp_ms).await
        }
        async fn prune_older_than(&self, topic: &str, path: &str, retention_secs: u64) -> StoreResult<u64> {
            self.inner.prune_older_than(topic, path, retention_secs).await
        }
        async fn count_in_window(&self, topic: &str, path: &str, window_secs: u64) -> StoreResult<u64> {
            self.inner.count_in_window(topic, path, window_secs).await
        }
        async fn median_in_window(&self, topic: &str, path: &str, window_secs: u64) -> StoreResult<f64> {
            self.inner.median_in_window(topic, path, window_secs).await
        }
        async fn std_dev_in_window(&self, topic: &str, path: &str, window_secs: u64) -> StoreResult<f64> {
            self.inner.std_dev_in_window(topic, path, window_secs).await
        }
        async fn total_events(&self) -> StoreResult<u64> {
            self.inner.total_events().await
        }
        async fn clear(&self) -> StoreResult<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn a_failing_field_does_not_poison_the_others() {
        let baselines = baselines_with(&[
            ("amount", 60, 100.0, 10.0),
            ("items", 60, 100.0, 10.0),
        ])
        .await;
        let evaluator = Evaluator::new(
            Arc::new(FailingPathStore {
                inner: MemoryStore::new(),
                fail_path: "items",
            }),
            baselines,
            Duration::from_secs(60),
        );
        let dsl = dsl(&[("amount", &["1m"]), ("items", &["1m"])]);

        let message = StreamMessage::new(
            "orders",
            Payload::from_json(json!({"amount": 131.0, "items": 131.0})),
            1_000,
        );
        let evaluation = evaluator.evaluate(&dsl, &message).await;
        assert_eq!(evaluation.anomalies.len(), 1);
        assert_eq!(evaluation.anomalies[0].field_path, "amount");
        assert_eq!(evaluation.failures.len(), 1);
        assert!(evaluation.failures[0].to_string().contains("orders:items"));
    }
}
