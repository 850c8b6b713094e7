//! Point-in-time engine state for an external reporting surface.

use std::collections::BTreeMap;

use serde::Serialize;

use vigil_baseline::Baseline;
use vigil_core::CounterSnapshot;
use vigil_discovery::DiscoverySnapshot;
use vigil_dsl::CompiledDsl;

/// Everything a status endpoint would render, serializable as one JSON
/// document.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// The current compiled analysis table, `None` before the first
    /// compile.
    pub dsl: Option<CompiledDsl>,
    /// Every cached baseline, keyed `topic:path:windowSecs`.
    pub baselines: BTreeMap<String, Baseline>,
    /// Known topics, field sets and change-detection hashes. Empty when
    /// discovery is disabled.
    pub discovery: DiscoverySnapshot,
    pub counters: CounterSnapshot,
    /// Samples currently held by the storage backend.
    pub stored_events: u64,
}
