//! Error types for the storage seam.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a storage backend can report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}
