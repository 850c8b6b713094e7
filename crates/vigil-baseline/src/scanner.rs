//! The fixed-delay scan scheduler.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use vigil_core::{EngineCounters, EngineEvent, EventBus};
use vigil_dsl::{DslHandle, FieldRule, WindowSpec};
use vigil_store::{SampleStore, StoreResult};

use crate::cache::{Baseline, BaselineCache};

/// Knobs for the scan scheduler.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Triples refreshed concurrently within one cycle.
    pub max_concurrency: usize,
    /// Fewer samples than this in a window means no baseline.
    pub min_samples: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(15_000),
            max_concurrency: 2,
            min_samples: 3,
        }
    }
}

/// Tally of one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Triples enumerated from the compiled table.
    pub scanned: usize,
    /// Baselines written or overwritten.
    pub refreshed: usize,
    /// Triples below the sample floor.
    pub cold: usize,
    /// Cold triples that had a stale entry removed.
    pub evicted: usize,
    /// Triples whose zero statistics left the previous entry in place.
    pub held: usize,
}

enum TripleOutcome {
    Refreshed,
    Cold { evicted: bool },
    Held,
}

/// Recomputes every (topic, field, window) baseline on a fixed delay.
///
/// A storage error aborts the cycle: remaining triples are dropped,
/// baselines already written this cycle stay, and the next interval is the
/// retry.
pub struct BaselineScanner {
    store: Arc<dyn SampleStore>,
    cache: Arc<BaselineCache>,
    dsl: DslHandle,
    config: ScanConfig,
    bus: EventBus,
    counters: Arc<EngineCounters>,
}

impl BaselineScanner {
    pub fn new(
        store: Arc<dyn SampleStore>,
        cache: Arc<BaselineCache>,
        dsl: DslHandle,
        config: ScanConfig,
        bus: EventBus,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            store,
            cache,
            dsl,
            config,
            bus,
            counters,
        }
    }

    /// One full cycle over the current table. `None` when nothing has been
    /// compiled yet.
    pub async fn scan_once(&self) -> StoreResult<Option<ScanStats>> {
        let Some(dsl) = self.dsl.load().await else {
            debug!("no compiled analysis table yet, skipping scan");
            return Ok(None);
        };

        let mut stats = ScanStats::default();
        let triples: Vec<(&str, &FieldRule, &WindowSpec)> = dsl.triples().collect();
        stats.scanned = triples.len();

        // Futures are built eagerly (they stay inert until polled) so the
        // stream holds no closure over higher-ranked lifetimes, which trips
        // rustc's auto-trait check once this future is spawned.
        let scans: Vec<_> = triples
            .into_iter()
            .map(|(topic, rule, window)| self.scan_triple(topic, rule, window))
            .collect();
        let mut outcomes =
            stream::iter(scans).buffered(self.config.max_concurrency.max(1));

        while let Some(outcome) = outcomes.try_next().await? {
            match outcome {
                TripleOutcome::Refreshed => stats.refreshed += 1,
                TripleOutcome::Cold { evicted } => {
                    stats.cold += 1;
                    if evicted {
                        stats.evicted += 1;
                    }
                }
                TripleOutcome::Held => stats.held += 1,
            }
        }

        debug!(
            scanned = stats.scanned,
            refreshed = stats.refreshed,
            cold = stats.cold,
            evicted = stats.evicted,
            held = stats.held,
            "scan cycle finished"
        );
        Ok(Some(stats))
    }

    async fn scan_triple(
        &self,
        topic: &str,
        rule: &FieldRule,
        window: &WindowSpec,
    ) -> StoreResult<TripleOutcome> {
        self.store
            .prune_older_than(topic, &rule.path, rule.retention_secs)
            .await?;

        let count = self
            .store
            .count_in_window(topic, &rule.path, window.secs)
            .await?;
        if count < self.config.min_samples {
            let evicted = self.cache.remove(topic, &rule.path, window.secs).await;
            if evicted {
                debug!(topic, path = %rule.path, window = %window.label, count, "window went thin, baseline evicted");
            } else {
                trace!(topic, path = %rule.path, window = %window.label, count, "not enough samples for a baseline");
            }
            return Ok(TripleOutcome::Cold { evicted });
        }

        let median = self
            .store
            .median_in_window(topic, &rule.path, window.secs)
            .await?;
        let std_dev = self
            .store
            .std_dev_in_window(topic, &rule.path, window.secs)
            .await?;

        // A zero statistic is indistinguishable from an empty aggregation
        // result at this seam; keep whatever entry is already cached.
        if median == 0.0 || std_dev == 0.0 {
            trace!(topic, path = %rule.path, window = %window.label, median, std_dev, "zero statistic, holding previous baseline");
            return Ok(TripleOutcome::Held);
        }

        self.cache
            .insert(topic, &rule.path, window.secs, Baseline { median, std_dev })
            .await;
        trace!(topic, path = %rule.path, window = %window.label, median, std_dev, "baseline refreshed");
        Ok(TripleOutcome::Refreshed)
    }

    /// Fixed-delay scan loop; exits on shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_concurrency = self.config.max_concurrency,
            min_samples = self.config.min_samples,
            "baseline scanner started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {
                    match self.scan_once().await {
                        Ok(Some(_)) => self.counters.record_scan_run(),
                        Ok(None) => {}
                        Err(err) => {
                            self.counters.record_scan_run();
                            self.counters.record_error();
                            warn!(%err, "scan cycle aborted");
                            self.bus.emit(EngineEvent::Error(format!("scan cycle aborted: {err}")));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("baseline scanner shutting down");
                    break;
                }
            }
        }
    }
}
