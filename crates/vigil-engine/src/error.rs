//! Error types for the orchestrator.

use thiserror::Error;

use vigil_store::StoreError;
use vigil_stream::StreamError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors the engine surfaces to its caller. Everything else (hook
/// failures, per-field persistence errors, produce errors) is non-fatal
/// and flows through the event bus instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration or hook bundle. The engine refuses to start.
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
