//! In-memory reference broker.
//!
//! Topics are a name → partition-count table, auto-created on first
//! produce. Each subscriber holds a bounded channel and a shared topic set;
//! produce awaits channel space, which is what gives the engine its
//! backpressure. No replay: a subscriber only sees records produced while
//! it is attached, Kafka-from-latest style.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

use vigil_core::StreamMessage;

use crate::{StreamClient, StreamResult, SUBSCRIPTION_CAPACITY, Subscription};

struct Subscriber {
    id: u64,
    topics: Arc<RwLock<BTreeSet<String>>>,
    tx: mpsc::Sender<StreamMessage>,
}

/// In-memory [`StreamClient`].
#[derive(Default)]
pub struct MemoryBroker {
    topics: RwLock<BTreeMap<String, u32>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic without producing to it.
    pub async fn create_topic(&self, name: &str, partitions: u32) {
        self.topics
            .write()
            .await
            .insert(name.to_string(), partitions);
    }

    /// Remove a topic from the listing. Queued messages stay queued.
    pub async fn delete_topic(&self, name: &str) {
        self.topics.write().await.remove(name);
    }

    async fn drop_subscribers(&self, ids: &[u64]) {
        if ids.is_empty() {
            return;
        }
        let mut subs = self.subscribers.write().await;
        subs.retain(|s| !ids.contains(&s.id));
        debug!(dropped = ids.len(), remaining = subs.len(), "pruned closed subscribers");
    }
}

#[async_trait]
impl StreamClient for MemoryBroker {
    async fn subscribe(&self, topics: &[String]) -> StreamResult<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let set: Arc<RwLock<BTreeSet<String>>> =
            Arc::new(RwLock::new(topics.iter().cloned().collect()));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.push(Subscriber {
            id,
            topics: Arc::clone(&set),
            tx,
        });
        debug!(subscriber = id, topics = topics.len(), "subscription opened");

        Ok(Subscription {
            rx: Mutex::new(rx),
            topics: set,
        })
    }

    async fn list_topics(&self) -> StreamResult<Vec<String>> {
        Ok(self.topics.read().await.keys().cloned().collect())
    }

    async fn produce(
        &self,
        topic: &str,
        partitions: u32,
        message: StreamMessage,
    ) -> StreamResult<()> {
        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert(partitions);

        // Snapshot matching senders so no registry lock is held across the
        // awaited sends.
        let mut targets = Vec::new();
        {
            let subs = self.subscribers.read().await;
            for sub in subs.iter() {
                if sub.topics.read().await.contains(topic) {
                    targets.push((sub.id, sub.tx.clone()));
                }
            }
        }

        let mut closed = Vec::new();
        for (id, tx) in targets {
            if tx.send(message.clone()).await.is_err() {
                closed.push(id);
            }
        }
        self.drop_subscribers(&closed).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Payload;

    fn msg(topic: &str, value: f64) -> StreamMessage {
        StreamMessage::new(topic, Payload::Number(value), 1_000)
    }

    #[tokio::test]
    async fn delivers_to_matching_subscribers_only() {
        let broker = MemoryBroker::new();
        let sub = broker.subscribe(&["orders".to_string()]).await.unwrap();

        broker.produce("orders", 1, msg("orders", 1.0)).await.unwrap();
        broker.produce("payments", 1, msg("payments", 2.0)).await.unwrap();
        broker.produce("orders", 1, msg("orders", 3.0)).await.unwrap();

        assert_eq!(sub.next().await.unwrap().payload, Payload::Number(1.0));
        assert_eq!(sub.next().await.unwrap().payload, Payload::Number(3.0));
    }

    #[tokio::test]
    async fn set_topics_takes_effect_for_later_produces() {
        let broker = MemoryBroker::new();
        let sub = broker.subscribe(&["orders".to_string()]).await.unwrap();

        broker.produce("payments", 1, msg("payments", 1.0)).await.unwrap();
        sub.set_topics(&["orders".to_string(), "payments".to_string()])
            .await;
        broker.produce("payments", 1, msg("payments", 2.0)).await.unwrap();

        // Only the post-adjustment record arrives.
        assert_eq!(sub.next().await.unwrap().payload, Payload::Number(2.0));
        assert_eq!(sub.topics().await, vec!["orders", "payments"]);
    }

    #[tokio::test]
    async fn produce_auto_creates_topics() {
        let broker = MemoryBroker::new();
        broker.create_topic("seeded", 3).await;
        broker.produce("fresh", 2, msg("fresh", 1.0)).await.unwrap();

        assert_eq!(broker.list_topics().await.unwrap(), vec!["fresh", "seeded"]);
    }

    #[tokio::test]
    async fn delete_topic_updates_the_listing() {
        let broker = MemoryBroker::new();
        broker.create_topic("a", 1).await;
        broker.create_topic("b", 1).await;
        broker.delete_topic("a").await;

        assert_eq!(broker.list_topics().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let broker = MemoryBroker::new();
        let sub = broker.subscribe(&["orders".to_string()]).await.unwrap();
        drop(sub);

        // Send fails against the dropped receiver; the broker prunes it.
        broker.produce("orders", 1, msg("orders", 1.0)).await.unwrap();
        assert_eq!(broker.subscribers.read().await.len(), 0);
    }
}
