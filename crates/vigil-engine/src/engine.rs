//! Engine construction, startup wiring, the consume loop and the anomaly
//! fan-out.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use vigil_baseline::{BaselineCache, BaselineScanner, ScanConfig};
use vigil_core::{
    Anomaly, CounterSnapshot, EngineCounters, EngineEvent, EventBus, Payload, StreamMessage,
    epoch_millis,
};
use vigil_detect::Evaluator;
use vigil_discovery::{Discovery, DiscoveryConfig, DiscoverySnapshot};
use vigil_dsl::{CompiledDsl, DslHandle, FieldEntry};
use vigil_store::SampleStore;
use vigil_stream::{StreamClient, Subscription};

use crate::config::{EngineConfig, TargetSection};
use crate::error::{EngineError, EngineResult};
use crate::hooks::{HookResult, Hooks};
use crate::status::EngineStatus;

/// The engine before it runs: configuration and collaborators, validated
/// and ready to be started.
pub struct Engine {
    config: EngineConfig,
    hooks: Hooks,
    stream: Arc<dyn StreamClient>,
    store: Arc<dyn SampleStore>,
    bus: EventBus,
    counters: Arc<EngineCounters>,
}

impl std::fmt::Debug for Engine {
    // Hooks and the stream/store trait objects carry no Debug bound.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate and assemble an engine. Fails when the mandatory
    /// `before_message` hook is missing or the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        hooks: Hooks,
        stream: Arc<dyn StreamClient>,
        store: Arc<dyn SampleStore>,
    ) -> EngineResult<Engine> {
        if hooks.before_message.is_none() {
            return Err(EngineError::Config(
                "missing mandatory before_message hook".to_string(),
            ));
        }
        config.validate()?;
        Ok(Engine {
            config,
            hooks,
            stream,
            store,
            bus: EventBus::new(),
            counters: Arc::new(EngineCounters::new()),
        })
    }

    /// Subscribe to engine events. Works before `start`, so no startup
    /// event is missed.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// Compile the static table, open the subscription, spawn the consume,
    /// scan and discovery loops.
    pub async fn start(self) -> EngineResult<EngineHandle> {
        let Engine {
            config,
            hooks,
            stream,
            store,
            bus,
            counters,
        } = self;

        let dsl = DslHandle::new();
        let initial = CompiledDsl::compile(&config.analysis);
        let topics = initial.subscribe_topics().to_vec();
        dsl.install(initial).await;

        let subscription = Arc::new(stream.subscribe(&topics).await?);
        info!(topics = topics.len(), "subscribed to configured topics");

        let baselines = Arc::new(BaselineCache::new());
        let evaluator = Evaluator::new(
            Arc::clone(&store),
            Arc::clone(&baselines),
            Duration::from_millis(config.cooldown_ms),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(EngineInner {
            config,
            hooks,
            stream,
            store,
            bus,
            counters,
            dsl,
            baselines,
            evaluator,
            subscription,
            discovered_fields: RwLock::new(BTreeMap::new()),
            discovered_topics: RwLock::new(BTreeSet::new()),
            recompile_lock: Mutex::new(()),
        });

        let mut tasks = Vec::new();

        let discovery = if inner.config.discovery.enabled {
            let discovery = Arc::new(build_discovery(&inner));
            // Cold start sees the existing topics right away; the loop
            // takes over from here.
            if let Err(err) = discovery.scan_topics().await {
                warn!(%err, "initial topic discovery failed");
            }
            let run_discovery = Arc::clone(&discovery);
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                run_discovery.run(shutdown).await;
            }));
            Some(discovery)
        } else {
            debug!("discovery disabled");
            None
        };

        let scanner = BaselineScanner::new(
            Arc::clone(&inner.store),
            Arc::clone(&inner.baselines),
            inner.dsl.clone(),
            ScanConfig {
                interval: Duration::from_millis(inner.config.scan.interval_ms),
                max_concurrency: inner.config.scan.max_concurrency,
                min_samples: inner.config.scan.min_samples,
            },
            inner.bus.clone(),
            Arc::clone(&inner.counters),
        );
        let scan_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            scanner.run(scan_shutdown).await;
        }));

        let consume_inner = Arc::clone(&inner);
        let consume_discovery = discovery.clone();
        let mut consume_shutdown = shutdown_rx;
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = consume_inner.subscription.next() => {
                        match message {
                            Some(message) => {
                                consume_inner
                                    .handle_message(message, consume_discovery.as_deref())
                                    .await;
                            }
                            None => {
                                info!("stream closed, consume loop exiting");
                                break;
                            }
                        }
                    }
                    _ = consume_shutdown.changed() => {
                        info!("consume loop shutting down");
                        break;
                    }
                }
            }
        }));

        info!("engine started");
        Ok(EngineHandle {
            inner,
            discovery,
            shutdown_tx,
            tasks,
        })
    }
}

fn build_discovery(inner: &Arc<EngineInner>) -> Discovery {
    let mut blacklist = inner.config.discovery.topic_blacklist.clone();
    if let Some(target) = &inner.config.target {
        // The engine's own sink must never feed back into analysis.
        blacklist.push(target.topic.clone());
    }

    let topics_inner = Arc::clone(inner);
    let fields_inner = Arc::clone(inner);

    Discovery::new(
        Arc::clone(&inner.stream),
        DiscoveryConfig {
            scan_interval: Duration::from_millis(inner.config.discovery.scan_interval_ms),
            field_reset: Duration::from_millis(inner.config.discovery.field_reset_ms),
            blacklist,
        },
        inner.bus.clone(),
    )
    .with_topics_callback(Arc::new(move |topics| {
        let inner = Arc::clone(&topics_inner);
        Box::pin(async move { inner.on_topics_discovered(topics).await })
    }))
    .with_fields_callback(Arc::new(move |topic, paths| {
        let inner = Arc::clone(&fields_inner);
        Box::pin(async move { inner.on_fields_discovered(topic, paths).await })
    }))
}

struct EngineInner {
    config: EngineConfig,
    hooks: Hooks,
    stream: Arc<dyn StreamClient>,
    store: Arc<dyn SampleStore>,
    bus: EventBus,
    counters: Arc<EngineCounters>,
    dsl: DslHandle,
    baselines: Arc<BaselineCache>,
    evaluator: Evaluator,
    subscription: Arc<Subscription>,
    discovered_fields: RwLock<BTreeMap<String, BTreeMap<String, FieldEntry>>>,
    discovered_topics: RwLock<BTreeSet<String>>,
    /// Serialized so an older table can never land after a newer one.
    recompile_lock: Mutex<()>,
}

impl EngineInner {
    /// One consumed message through the whole pipeline: hook, count,
    /// publish, inline field inference, score, anomaly fan-out.
    async fn handle_message(&self, message: StreamMessage, discovery: Option<&Discovery>) {
        // Presence is validated at construction.
        let Some(hook) = &self.hooks.before_message else {
            return;
        };
        let message = match hook(message) {
            HookResult::Transformed(message) => message,
            HookResult::Dropped => {
                trace!("message dropped by hook");
                return;
            }
            HookResult::Failed(err) => {
                warn!(%err, "message hook failed");
                self.counters.record_error();
                self.bus
                    .emit(EngineEvent::Error(format!("message hook failed: {err}")));
                return;
            }
        };

        self.counters.record_message();
        self.bus.emit(EngineEvent::Message(message.clone()));

        if let Some(discovery) = discovery {
            discovery.handle_message(&message).await;
        }

        let Some(dsl) = self.dsl.load().await else {
            return;
        };
        let evaluation = self.evaluator.evaluate(&dsl, &message).await;

        for failure in evaluation.failures {
            warn!(failure = %failure, "field evaluation failed");
            self.counters.record_error();
            self.bus.emit(EngineEvent::Error(failure.to_string()));
        }
        for anomaly in evaluation.anomalies {
            self.handle_anomaly(anomaly).await;
        }
    }

    async fn handle_anomaly(&self, anomaly: Anomaly) {
        let anomaly = match &self.hooks.before_anomaly {
            Some(hook) => match hook(anomaly) {
                HookResult::Transformed(anomaly) => anomaly,
                HookResult::Dropped => {
                    debug!("anomaly dropped by hook");
                    return;
                }
                HookResult::Failed(err) => {
                    warn!(%err, "anomaly hook failed");
                    self.counters.record_error();
                    self.bus
                        .emit(EngineEvent::Error(format!("anomaly hook failed: {err}")));
                    return;
                }
            },
            None => anomaly,
        };

        self.counters.record_anomaly();
        info!(
            topic = %anomaly.topic,
            path = %anomaly.field_path,
            window = %anomaly.window_label,
            value = anomaly.value,
            score = anomaly.score,
            "anomaly accepted"
        );
        self.bus.emit(EngineEvent::Anomaly(anomaly.clone()));

        if let Some(target) = &self.config.target {
            self.produce_anomaly(target, anomaly).await;
        }
    }

    /// Serialize the anomaly and produce it to the sink topic, keyed by
    /// its identity hash. Failures are non-fatal.
    async fn produce_anomaly(&self, target: &TargetSection, anomaly: Anomaly) {
        let payload = match serde_json::to_value(&anomaly) {
            Ok(value) => Payload::from_json(value),
            Err(err) => {
                self.counters.record_error();
                self.bus.emit(EngineEvent::Error(format!(
                    "failed to serialize anomaly {}: {err}",
                    anomaly.id
                )));
                return;
            }
        };
        let record = StreamMessage::new(target.topic.as_str(), payload, epoch_millis())
            .with_key(anomaly.id.clone());
        if let Err(err) = self
            .stream
            .produce(&target.topic, target.partitions, record)
            .await
        {
            warn!(%err, topic = %target.topic, "anomaly production failed");
            self.counters.record_error();
            self.bus.emit(EngineEvent::Error(format!(
                "anomaly production failed: {err}"
            )));
        }
    }

    async fn on_topics_discovered(&self, topics: Vec<String>) {
        {
            let mut known = self.discovered_topics.write().await;
            known.clear();
            known.extend(topics);
        }
        self.counters.record_topic_update();
        self.recompile().await;
    }

    async fn on_fields_discovered(&self, topic: String, paths: Vec<String>) {
        let mut entries = BTreeMap::new();
        for path in paths {
            match self.field_entry_for(&topic, &path) {
                HookResult::Transformed(entry) => {
                    entries.insert(path, entry);
                }
                HookResult::Dropped => {
                    debug!(topic = %topic, path = %path, "discovered field dropped by hook");
                }
                HookResult::Failed(err) => {
                    warn!(topic = %topic, path = %path, %err, "discovery field hook failed");
                    self.counters.record_error();
                    self.bus.emit(EngineEvent::Error(format!(
                        "discovery field hook failed for {topic}:{path}: {err}"
                    )));
                }
            }
        }
        self.discovered_fields.write().await.insert(topic, entries);
        self.counters.record_field_update();
        self.recompile().await;
    }

    fn field_entry_for(&self, topic: &str, path: &str) -> HookResult<FieldEntry> {
        match &self.hooks.discovery_field_config {
            Some(hook) => hook(topic, path),
            None => HookResult::Transformed(FieldEntry::new(
                self.config.discovery.default_windows.iter().cloned(),
            )),
        }
    }

    /// Merge static and discovered entries, compile, swap the table in and
    /// update the subscription.
    async fn recompile(&self) {
        let _guard = self.recompile_lock.lock().await;
        let discovered_fields = self.discovered_fields.read().await.clone();
        let discovered_topics = self.discovered_topics.read().await.clone();

        let mut document = self.config.analysis.merged_with(&discovered_fields);
        for topic in discovered_topics {
            document.topics.entry(topic).or_default();
        }

        let dsl = CompiledDsl::compile(&document);
        let topics = dsl.subscribe_topics().to_vec();
        self.dsl.install(dsl).await;
        self.subscription.set_topics(&topics).await;
        debug!(topics = topics.len(), "analysis table recompiled");
    }
}

/// Handle to a running engine.
pub struct EngineHandle {
    inner: Arc<EngineInner>,
    discovery: Option<Arc<Discovery>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Subscribe to engine events.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.bus.subscribe()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.inner.counters.snapshot()
    }

    /// The current compiled table snapshot.
    pub async fn dsl(&self) -> Option<Arc<CompiledDsl>> {
        self.inner.dsl.load().await
    }

    /// Topics the live subscription currently covers.
    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.inner.subscription.topics().await
    }

    /// Assemble the full status snapshot.
    pub async fn status(&self) -> EngineResult<EngineStatus> {
        let discovery = match &self.discovery {
            Some(discovery) => discovery.snapshot().await,
            None => DiscoverySnapshot::default(),
        };
        Ok(EngineStatus {
            dsl: self.inner.dsl.load().await.map(|dsl| (*dsl).clone()),
            baselines: self.inner.baselines.snapshot().await,
            discovery,
            counters: self.inner.counters.snapshot(),
            stored_events: self.inner.store.total_events().await?,
        })
    }

    /// Signal every loop and wait for all of them to finish.
    pub async fn shutdown(mut self) {
        info!("engine shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("engine stopped");
    }
}
