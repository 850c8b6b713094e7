//! The discovery task: topic-list polling and inline field inference.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, trace, warn};

use vigil_core::{EngineEvent, EventBus, StreamMessage, hash_sorted};
use vigil_stream::StreamClient;

use crate::error::DiscoveryResult;
use crate::infer::infer_numeric_paths;

/// Transport-internal bookkeeping topics carry this prefix and are never
/// surfaced, Kafka `__consumer_offsets` style.
const INTERNAL_TOPIC_PREFIX: &str = "__";

/// Invoked with the full topic set after every topic-list change.
pub type TopicsCallback = Arc<dyn Fn(Vec<String>) -> BoxFuture + Send + Sync>;

/// Invoked with `(topic, numeric paths)` after every field-set change.
pub type FieldsCallback = Arc<dyn Fn(String, Vec<String>) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Knobs for the discovery task.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How often the topic listing is polled.
    pub scan_interval: Duration,
    /// How often the per-topic inference flags are cleared. The reset rides
    /// on the topic-scan timer, so the effective period is rounded up to a
    /// multiple of `scan_interval`.
    pub field_reset: Duration,
    /// Topics to ignore entirely, e.g. the engine's own anomaly sink.
    pub blacklist: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(15_000),
            field_reset: Duration::from_millis(30_000),
            blacklist: Vec::new(),
        }
    }
}

/// Point-in-time discovery state for the status surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverySnapshot {
    /// Known topics, sorted.
    pub topics: Vec<String>,
    /// Hash of the known topic set, `None` before the first change.
    pub topics_hash: Option<String>,
    /// Last inferred numeric paths per topic.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Hash of each topic's field set.
    pub field_hashes: BTreeMap<String, String>,
}

struct DiscoveryState {
    known_topics: BTreeSet<String>,
    topics_hash: Option<String>,
    field_hashes: HashMap<String, String>,
    field_sets: HashMap<String, Vec<String>>,
    /// Topics already inferred in the current cycle.
    inferred: HashSet<String>,
    last_reset: Instant,
}

impl DiscoveryState {
    fn new() -> Self {
        Self {
            known_topics: BTreeSet::new(),
            topics_hash: None,
            field_hashes: HashMap::new(),
            field_sets: HashMap::new(),
            inferred: HashSet::new(),
            last_reset: Instant::now(),
        }
    }
}

/// Discovers topics from the transport listing and numeric fields from
/// live traffic. Emits diff events on the bus and notifies the registered
/// callbacks so the orchestrator can recompile.
pub struct Discovery {
    stream: Arc<dyn StreamClient>,
    config: DiscoveryConfig,
    bus: EventBus,
    state: RwLock<DiscoveryState>,
    on_topics: Option<TopicsCallback>,
    on_fields: Option<FieldsCallback>,
}

impl Discovery {
    pub fn new(stream: Arc<dyn StreamClient>, config: DiscoveryConfig, bus: EventBus) -> Self {
        Self {
            stream,
            config,
            bus,
            state: RwLock::new(DiscoveryState::new()),
            on_topics: None,
            on_fields: None,
        }
    }

    /// Register the topic-change callback.
    pub fn with_topics_callback(mut self, callback: TopicsCallback) -> Self {
        self.on_topics = Some(callback);
        self
    }

    /// Register the field-change callback.
    pub fn with_fields_callback(mut self, callback: FieldsCallback) -> Self {
        self.on_fields = Some(callback);
        self
    }

    /// Poll the topic listing once. Returns whether the topic set changed.
    ///
    /// An empty listing is treated as a transport hiccup, not a mass
    /// delete: nothing is diffed and the known set survives.
    pub async fn scan_topics(&self) -> DiscoveryResult<bool> {
        let mut topics = self.stream.list_topics().await?;
        topics.retain(|topic| {
            !topic.starts_with(INTERNAL_TOPIC_PREFIX)
                && !self.config.blacklist.iter().any(|b| b == topic)
        });
        if topics.is_empty() {
            trace!("no visible topics");
            return Ok(false);
        }

        let new_hash = hash_sorted(&topics);
        let (created, deleted, full) = {
            let mut state = self.state.write().await;
            if state.topics_hash.as_deref() == Some(new_hash.as_str()) {
                trace!("topic set unchanged");
                return Ok(false);
            }

            let new_set: BTreeSet<String> = topics.into_iter().collect();
            let created: Vec<String> = new_set.difference(&state.known_topics).cloned().collect();
            let deleted: Vec<String> = state.known_topics.difference(&new_set).cloned().collect();

            for topic in &deleted {
                state.field_hashes.remove(topic);
                state.field_sets.remove(topic);
                state.inferred.remove(topic);
            }

            state.topics_hash = Some(new_hash);
            state.known_topics = new_set;
            let full: Vec<String> = state.known_topics.iter().cloned().collect();
            (created, deleted, full)
        };

        info!(
            created = created.len(),
            deleted = deleted.len(),
            total = full.len(),
            "topic set changed"
        );
        if !created.is_empty() {
            self.bus.emit(EngineEvent::TopicsCreated(created));
        }
        if !deleted.is_empty() {
            self.bus.emit(EngineEvent::TopicsDeleted(deleted));
        }
        self.bus.emit(EngineEvent::TopicsDiscovered(full.clone()));
        if let Some(callback) = &self.on_topics {
            callback(full).await;
        }
        Ok(true)
    }

    /// Inspect one consumed message for field discovery. Returns whether
    /// the topic's field set changed.
    ///
    /// Only the first message per topic per inference cycle is inspected;
    /// the flag stays set until the next reset rolls around.
    pub async fn handle_message(&self, message: &StreamMessage) -> bool {
        if message.topic.is_empty() || message.payload.is_null() {
            return false;
        }

        let (topic, paths) = {
            let mut state = self.state.write().await;
            if !state.inferred.insert(message.topic.clone()) {
                return false;
            }

            let paths = infer_numeric_paths(&message.payload);
            let new_hash = hash_sorted(&paths);
            if state.field_hashes.get(&message.topic).map(String::as_str)
                == Some(new_hash.as_str())
            {
                trace!(topic = %message.topic, "field set unchanged");
                return false;
            }

            state.field_hashes.insert(message.topic.clone(), new_hash);
            state
                .field_sets
                .insert(message.topic.clone(), paths.clone());
            (message.topic.clone(), paths)
        };

        info!(topic = %topic, fields = paths.len(), "numeric field set changed");
        self.bus.emit(EngineEvent::FieldsDiscovered {
            topic: topic.clone(),
            paths: paths.clone(),
        });
        if let Some(callback) = &self.on_fields {
            callback(topic, paths).await;
        }
        true
    }

    /// Clear the inference flags when the reset period has elapsed. Rides
    /// on the topic-scan timer instead of owning one.
    async fn maybe_reset_flags(&self) {
        let mut state = self.state.write().await;
        if state.last_reset.elapsed() < self.config.field_reset {
            return;
        }
        state.last_reset = Instant::now();
        let cleared = state.inferred.len();
        state.inferred.clear();
        if cleared > 0 {
            debug!(cleared, "field inference flags reset");
        }
    }

    /// Periodic scan loop; exits on shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_ms = self.config.scan_interval.as_millis() as u64,
            reset_ms = self.config.field_reset.as_millis() as u64,
            "discovery started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_interval) => {
                    if let Err(err) = self.scan_topics().await {
                        warn!(%err, "topic discovery failed");
                    }
                    self.maybe_reset_flags().await;
                }
                _ = shutdown.changed() => {
                    info!("discovery shutting down");
                    break;
                }
            }
        }
    }

    pub async fn snapshot(&self) -> DiscoverySnapshot {
        let state = self.state.read().await;
        DiscoverySnapshot {
            topics: state.known_topics.iter().cloned().collect(),
            topics_hash: state.topics_hash.clone(),
            fields: state
                .field_sets
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            field_hashes: state
                .field_hashes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}
