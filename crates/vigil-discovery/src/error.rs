//! Error types for discovery.

use thiserror::Error;

use vigil_stream::StreamError;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors the discovery task can report. All of them are non-fatal: the
/// recurring scan interval is the retry mechanism.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("topic listing failed: {0}")]
    Listing(#[from] StreamError),
}
