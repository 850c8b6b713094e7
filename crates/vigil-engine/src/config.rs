//! Engine configuration, loaded from TOML.
//!
//! Every knob has a default, so an empty document is a valid (if idle)
//! engine. Intervals are millisecond integers to keep test configs fast.

use std::path::Path;

use serde::{Deserialize, Serialize};

use vigil_dsl::AnalysisConfig;

use crate::error::{EngineError, EngineResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Static analysis table: topic → field → windows. Discovery merges
    /// into this at runtime, static entries winning.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub scan: ScanSection,
    /// Minimum gap between two emitted anomalies of one (topic, field,
    /// window) triple, milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Optional production of accepted anomalies back onto the stream.
    #[serde(default)]
    pub target: Option<TargetSection>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            discovery: DiscoverySection::default(),
            scan: ScanSection::default(),
            cooldown_ms: default_cooldown_ms(),
            target: None,
        }
    }
}

/// Discovery knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Topic-list poll interval, milliseconds.
    #[serde(default = "default_topic_scan_ms")]
    pub scan_interval_ms: u64,
    /// Field inference flag reset period, milliseconds.
    #[serde(default = "default_field_reset_ms")]
    pub field_reset_ms: u64,
    /// Topics discovery must never touch. The anomaly target topic is
    /// appended automatically.
    #[serde(default)]
    pub topic_blacklist: Vec<String>,
    /// Windows assigned to discovered fields when no hook overrides them.
    #[serde(default = "default_discovery_windows")]
    pub default_windows: Vec<String>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: default_topic_scan_ms(),
            field_reset_ms: default_field_reset_ms(),
            topic_blacklist: Vec::new(),
            default_windows: default_discovery_windows(),
        }
    }
}

/// Baseline scan knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSection {
    /// Fixed delay between scan cycles, milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub interval_ms: u64,
    /// Triples refreshed concurrently within one cycle.
    #[serde(default = "default_scan_concurrency")]
    pub max_concurrency: usize,
    /// Fewer samples than this in a window means no baseline.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            interval_ms: default_scan_interval_ms(),
            max_concurrency: default_scan_concurrency(),
            min_samples: default_min_samples(),
        }
    }
}

/// Where accepted anomalies are produced. Both fields are mandatory when
/// the section is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    pub topic: String,
    pub partitions: u32,
}

fn default_true() -> bool {
    true
}

fn default_topic_scan_ms() -> u64 {
    15_000
}

fn default_field_reset_ms() -> u64 {
    30_000
}

fn default_discovery_windows() -> Vec<String> {
    vec!["1m".to_string(), "15m".to_string(), "1h".to_string()]
}

fn default_scan_interval_ms() -> u64 {
    15_000
}

fn default_scan_concurrency() -> usize {
    2
}

fn default_min_samples() -> u64 {
    3
}

fn default_cooldown_ms() -> u64 {
    120_000
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Startup-time checks beyond what serde enforces.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(target) = &self.target {
            if target.topic.trim().is_empty() {
                return Err(EngineError::Config(
                    "target.topic must not be empty".to_string(),
                ));
            }
            if target.partitions == 0 {
                return Err(EngineError::Config(
                    "target.partitions must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}
