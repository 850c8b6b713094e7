//! vigil-engine — the orchestrator.
//!
//! [`Engine::new`] takes a configuration, a hook bundle and the two
//! collaborators (stream transport, sample store); [`Engine::start`] wires
//! everything together and hands back an [`EngineHandle`] for events,
//! status and shutdown.
//!
//! # Architecture
//!
//! ```text
//! Engine::start()
//!   ├── compile analysis table → DslHandle, subscribe topics
//!   ├── consume loop: hook → persist/score → anomaly fan-out
//!   ├── BaselineScanner::run() (fixed-delay cycles)
//!   └── Discovery::run() (topic polls + field-flag resets)
//!         └── callbacks → merge → recompile → resubscribe
//! ```
//!
//! Recompiles swap the compiled table atomically; in-flight evaluations
//! finish against the snapshot they started with.

pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod status;

pub use config::{DiscoverySection, EngineConfig, ScanSection, TargetSection};
pub use engine::{Engine, EngineHandle};
pub use error::{EngineError, EngineResult};
pub use hooks::{AnomalyHook, FieldConfigHook, HookResult, Hooks, MessageHook};
pub use status::EngineStatus;
