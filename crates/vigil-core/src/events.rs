//! Observable engine events over a broadcast channel.
//!
//! Everything the pipeline wants to surface — accepted messages, anomalies,
//! errors, discovery diffs — goes through one [`EventBus`]. Emission is
//! fire-and-forget: no subscribers is fine, lagging subscribers miss events.

use tokio::sync::broadcast;

use crate::anomaly::Anomaly;
use crate::message::StreamMessage;

/// Channel capacity for the event stream.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Every event the engine emits.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A message accepted into the pipeline (post message hook).
    Message(StreamMessage),
    /// An accepted anomaly detection (post anomaly hook).
    Anomaly(Anomaly),
    /// A non-fatal failure: hook error, storage error, produce error.
    Error(String),
    /// Full current topic set after a topic-list change.
    TopicsDiscovered(Vec<String>),
    /// Topics present now that were absent last scan.
    TopicsCreated(Vec<String>),
    /// Topics absent now that were present last scan.
    TopicsDeleted(Vec<String>),
    /// A topic's numeric field set changed.
    FieldsDiscovered { topic: String, paths: Vec<String> },
}

/// Broadcast bus for [`EngineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Emit an event; ignore the error when nobody is listening.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(EngineEvent::TopicsCreated(vec!["orders".into()]));

        match rx.recv().await {
            Ok(EngineEvent::TopicsCreated(topics)) => assert_eq!(topics, vec!["orders"]),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::Error("nobody listening".into()));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
