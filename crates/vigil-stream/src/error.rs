//! Error types for the stream seam.

use thiserror::Error;

/// Result type alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors a stream transport can report.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("transport failure: {0}")]
    Transport(String),
}
