//! vigil-store — the persistence/aggregation seam.
//!
//! The engine never talks to a database directly; it stores raw samples and
//! asks for windowed aggregates through [`SampleStore`]. Whatever backs the
//! trait owns indexing and retention mechanics. [`MemoryStore`] is the
//! reference backend used by the test suite and the demo daemon.
//!
//! Aggregates return `0.0` when a window holds no rows — callers treat zero
//! as "missing", matching typical aggregation-pipeline behavior.

pub mod error;
pub mod memory;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// Storage collaborator: per-(topic, field) sample series with windowed
/// aggregation.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Append one sample. `timestamp_ms` is the producer timestamp.
    async fn store(
        &self,
        topic: &str,
        path: &str,
        value: f64,
        timestamp_ms: i64,
    ) -> StoreResult<()>;

    /// Drop samples of the series older than `retention_secs`. Returns how
    /// many were removed.
    async fn prune_older_than(
        &self,
        topic: &str,
        path: &str,
        retention_secs: u64,
    ) -> StoreResult<u64>;

    /// Number of samples within the trailing window.
    async fn count_in_window(&self, topic: &str, path: &str, window_secs: u64)
    -> StoreResult<u64>;

    /// Median of the trailing window; `0.0` when empty.
    async fn median_in_window(
        &self,
        topic: &str,
        path: &str,
        window_secs: u64,
    ) -> StoreResult<f64>;

    /// Population standard deviation of the trailing window; `0.0` when
    /// empty.
    async fn std_dev_in_window(
        &self,
        topic: &str,
        path: &str,
        window_secs: u64,
    ) -> StoreResult<f64>;

    /// Total samples held across all series.
    async fn total_events(&self) -> StoreResult<u64>;

    /// Drop everything.
    async fn clear(&self) -> StoreResult<()>;
}
