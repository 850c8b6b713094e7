//! vigil-discovery — runtime discovery of topics and numeric fields.
//!
//! Nothing here requires configuration up front: the discovery task polls
//! the transport's topic listing on a timer and diffs it against the last
//! known set, while field discovery rides along with normal consumption by
//! inferring the numeric paths of the first message seen per topic per
//! inference cycle.
//!
//! # Architecture
//!
//! ```text
//! Discovery
//!   ├── run() → periodic topic scan + field-flag reset
//!   │     └── scan_topics(): list → filter → hash → diff → events
//!   ├── handle_message() ← called inline from the consume loop
//!   │     └── infer_numeric_paths() → hash → FieldsDiscovered
//!   └── callbacks notify the orchestrator to recompile
//! ```
//!
//! Change detection is hash-based on both axes: the sorted topic list and
//! each topic's sorted field-path list are reduced to short stable hashes,
//! so an unchanged world costs one comparison and emits nothing.

pub mod discovery;
pub mod error;
pub mod infer;

pub use discovery::{Discovery, DiscoveryConfig, DiscoverySnapshot, FieldsCallback, TopicsCallback};
pub use error::{DiscoveryError, DiscoveryResult};
pub use infer::infer_numeric_paths;
