//! vigil-baseline — windowed statistics, recomputed on a timer.
//!
//! The evaluator never aggregates inline: it reads (median, stdDev) pairs
//! out of the [`BaselineCache`], and the [`BaselineScanner`] refreshes that
//! cache on a fixed delay over every (topic, field, window) triple the
//! compiled analysis table names.
//!
//! # Architecture
//!
//! ```text
//! BaselineScanner
//!   ├── run() → fixed-delay loop, skipped until a table is compiled
//!   └── scan_once() per triple, bounded concurrency:
//!         prune → count → (evict | hold | refresh)
//! BaselineCache
//!   └── read by the evaluator, written only by the scanner
//! ```
//!
//! Fixed delay means the next cycle starts a full interval after the
//! previous one finished, so cycles never overlap no matter how slow the
//! storage backend gets.

pub mod cache;
pub mod scanner;

pub use cache::{Baseline, BaselineCache, baseline_key};
pub use scanner::{BaselineScanner, ScanConfig, ScanStats};
