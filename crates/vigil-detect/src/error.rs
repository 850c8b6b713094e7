//! Error types for evaluation.

use thiserror::Error;

use vigil_store::StoreError;

/// Result type alias for evaluation operations.
pub type DetectResult<T> = Result<T, DetectError>;

/// Failures attributable to a single field of a single message.
/// Evaluation collects these instead of short-circuiting, so one bad
/// field cannot mute another field's verdicts.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to persist {topic}:{path}: {source}")]
    Persist {
        topic: String,
        path: String,
        #[source]
        source: StoreError,
    },
}
