//! vigil-detect — scoring a live value against its cached baselines.
//!
//! One message fans out to every (field, window) its topic's rules name:
//! the field value is extracted and persisted once, then each window is
//! scored as `(value - median) / (3 * stdDev)` against the baseline cache.
//! A score strictly outside ±1.0 is an anomaly, subject to per-triple
//! cooldown suppression so a sustained deviation raises one alert, not a
//! flood.
//!
//! Scoring is pure lookup: no aggregation runs on the message path. Cold
//! triples (no cached baseline yet) score nothing.

pub mod cooldown;
pub mod error;
pub mod evaluator;

pub use cooldown::CooldownCache;
pub use error::{DetectError, DetectResult};
pub use evaluator::{Evaluation, Evaluator};
