//! Running counters for the status surface.
//!
//! Lock-free: every counter is a relaxed `AtomicU64`, bumped from whichever
//! task owns the event and read as a point-in-time snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide engine counters. Shared as `Arc<EngineCounters>`.
#[derive(Debug, Default)]
pub struct EngineCounters {
    /// Messages accepted into the pipeline by the message hook.
    messages: AtomicU64,
    /// Anomalies that survived cooldown and the anomaly hook.
    anomalies: AtomicU64,
    /// Baseline scan cycles that actually executed (success or failure).
    scan_runs: AtomicU64,
    /// Topic-set changes observed by discovery.
    topic_updates: AtomicU64,
    /// Field-set changes that triggered a recompile.
    field_updates: AtomicU64,
    /// Non-fatal errors surfaced on the event bus.
    errors: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_run(&self) {
        self.scan_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_topic_update(&self) {
        self.topic_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_field_update(&self) {
        self.field_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            scan_runs: self.scan_runs.load(Ordering::Relaxed),
            topic_updates: self.topic_updates.load(Ordering::Relaxed),
            field_updates: self.field_updates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub messages: u64,
    pub anomalies: u64,
    pub scan_runs: u64,
    pub topic_updates: u64,
    pub field_updates: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let counters = EngineCounters::new();
        counters.record_message();
        counters.record_message();
        counters.record_anomaly();
        counters.record_error();

        let snap = counters.snapshot();
        assert_eq!(snap.messages, 2);
        assert_eq!(snap.anomalies, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.scan_runs, 0);
    }
}
