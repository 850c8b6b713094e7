//! The anomaly record: one accepted (non-suppressed) detection.

use serde::Serialize;

use crate::message::StreamMessage;

/// A single 3-sigma violation, created once and never mutated.
///
/// `score` is `(value - median) / (3 * std_dev)`; the record only exists
/// when `|score| > 1.0` and the (topic, field, window) triple was not in
/// cooldown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    /// Identity hash derived from the suppression key and the message
    /// timestamp.
    pub id: String,
    pub topic: String,
    pub field_path: String,
    pub window_secs: u64,
    /// Human label for the window, e.g. `"15m"`.
    pub window_label: String,
    pub value: f64,
    pub median: f64,
    pub std_dev: f64,
    pub score: f64,
    /// The message the value was extracted from.
    pub message: StreamMessage,
}
