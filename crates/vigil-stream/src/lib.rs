//! vigil-stream — the stream transport seam.
//!
//! [`StreamClient`] is everything the engine needs from a broker: subscribe
//! to a topic set, list live topics, produce records. Consumption is
//! pull-based through [`Subscription`] so the engine controls pacing: the
//! transport cannot push a second message while the first one's fan-out is
//! still in flight.
//!
//! [`MemoryBroker`] is the reference transport backing tests and the demo
//! daemon.

pub mod error;
pub mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};

use vigil_core::StreamMessage;

pub use error::{StreamError, StreamResult};
pub use memory::MemoryBroker;

/// Bounded buffer per subscription; producers wait when it fills.
pub const SUBSCRIPTION_CAPACITY: usize = 64;

/// Stream collaborator: the wire-level client the engine consumes from and
/// produces to.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Open a pull subscription over `topics`.
    async fn subscribe(&self, topics: &[String]) -> StreamResult<Subscription>;

    /// Names of all live topics.
    async fn list_topics(&self) -> StreamResult<Vec<String>>;

    /// Produce one record to `topic`, creating it with `partitions` if the
    /// transport has never seen it.
    async fn produce(
        &self,
        topic: &str,
        partitions: u32,
        message: StreamMessage,
    ) -> StreamResult<()>;
}

/// A live subscription. `next` pulls one message; the topic set can be
/// adjusted in place without reopening the subscription.
pub struct Subscription {
    pub(crate) rx: Mutex<mpsc::Receiver<StreamMessage>>,
    pub(crate) topics: Arc<RwLock<BTreeSet<String>>>,
}

impl Subscription {
    /// Next message, or `None` once the transport is gone.
    pub async fn next(&self) -> Option<StreamMessage> {
        self.rx.lock().await.recv().await
    }

    /// Replace the subscribed topic set.
    pub async fn set_topics(&self, topics: &[String]) {
        let mut set = self.topics.write().await;
        set.clear();
        set.extend(topics.iter().cloned());
    }

    /// The currently subscribed topics, sorted.
    pub async fn topics(&self) -> Vec<String> {
        self.topics.read().await.iter().cloned().collect()
    }
}
