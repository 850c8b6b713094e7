//! Error types for DSL parsing.

use thiserror::Error;

/// Result type alias for DSL operations.
pub type DslResult<T> = Result<T, DslError>;

/// Errors that can occur while parsing analysis configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DslError {
    #[error("unparseable duration {input:?}")]
    InvalidDuration { input: String },
}
