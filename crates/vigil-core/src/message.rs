//! Stream messages and their tagged payload values.
//!
//! A [`Payload`] is the engine-side view of whatever bytes arrived on the
//! wire: decoded JSON where possible, an opaque byte leaf otherwise. Field
//! extraction and schema inference both walk this one representation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A structured message body as a tagged value.
///
/// Objects keep their keys sorted (`BTreeMap`) so walks over a payload are
/// deterministic. Arrays are addressable by positional index, exactly like
/// object keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Opaque binary body that did not decode as JSON. Never descended into.
    Bytes(Vec<u8>),
    Array(Vec<Payload>),
    Object(BTreeMap<String, Payload>),
}

impl Payload {
    /// Decode raw wire bytes: JSON if it parses, an opaque byte leaf if not.
    pub fn from_bytes(bytes: &[u8]) -> Payload {
        match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(value) => Payload::from_json(value),
            Err(_) => Payload::Bytes(bytes.to_vec()),
        }
    }

    /// Convert a decoded JSON value into a tagged payload.
    pub fn from_json(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::Bool(b) => Payload::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Payload::Number(f),
                None => Payload::Null,
            },
            serde_json::Value::String(s) => Payload::String(s),
            serde_json::Value::Array(items) => {
                Payload::Array(items.into_iter().map(Payload::from_json).collect())
            }
            serde_json::Value::Object(map) => Payload::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Payload::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    /// Resolve a dot-separated path against this value.
    ///
    /// The empty path resolves to the value itself (a bare numeric body is
    /// addressed as `""`). Array segments are parsed as positional indexes.
    pub fn value_at(&self, path: &str) -> Option<&Payload> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Payload::Object(map) => map.get(segment)?,
                Payload::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolve a path and return it only if it is a numeric leaf.
    pub fn number_at(&self, path: &str) -> Option<f64> {
        match self.value_at(path)? {
            Payload::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One message as delivered by the stream collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Payload,
    /// Producer timestamp, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl StreamMessage {
    pub fn new(topic: impl Into<String>, payload: Payload, timestamp_ms: i64) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload,
            timestamp_ms,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}
