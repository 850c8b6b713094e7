//! vigil-core — shared data model for the Vigil anomaly engine.
//!
//! Everything the pipeline crates agree on lives here: the stream message
//! and its tagged payload value, the anomaly record, the broadcast event
//! bus, the running counters, and the stable hashing helpers used for
//! change detection and suppression keys.
//!
//! # Architecture
//!
//! [`Payload`] models arbitrary structured message bodies as a tagged value
//! (null, bool, number, string, bytes, array, object) so the schema
//! inferencer and the path extractor share one representation. Binary
//! payloads that fail JSON decoding become opaque [`Payload::Bytes`] leaves
//! and are never descended into.
//!
//! [`EventBus`] is a thin wrapper over `tokio::sync::broadcast`: emission
//! never blocks and never fails, subscribers that lag simply miss events.

pub mod anomaly;
pub mod counters;
pub mod events;
pub mod hash;
pub mod message;

pub use anomaly::Anomaly;
pub use counters::{CounterSnapshot, EngineCounters};
pub use events::{EngineEvent, EventBus};
pub use hash::{hash_sorted, stable_hash};
pub use message::{Payload, StreamMessage, epoch_millis};
