//! vigil-dsl — the declarative analysis configuration and its compiler.
//!
//! A raw [`AnalysisConfig`] document (topic → fields → window strings, from
//! TOML/JSON or from discovery) compiles into an immutable [`CompiledDsl`]
//! table: per-topic field rules with parsed windows and computed retention.
//!
//! # Architecture
//!
//! Compilation never fails as a whole. Unparseable window strings are
//! dropped with a warning, fields left with zero windows are dropped, and
//! topics without a fields table stay subscribe-only. The compiled table is
//! shared through a [`DslHandle`]: readers clone out an `Arc` snapshot,
//! recompiles swap the pointer whole, so nothing ever observes a
//! half-updated table.

pub mod compiler;
pub mod config;
pub mod duration;
pub mod error;
pub mod handle;

pub use compiler::{CompiledDsl, FieldRule, WindowSpec};
pub use config::{AnalysisConfig, FieldEntry, TopicEntry};
pub use duration::{format_duration, parse_duration};
pub use error::{DslError, DslResult};
pub use handle::DslHandle;
