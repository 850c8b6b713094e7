//! The raw, pre-compilation analysis document.
//!
//! Shape: `{ [topic]: { fields: { [dotPath]: { windows: [duration, ...] } } } }`.
//! Deserializes from TOML or JSON; discovery merges into it at runtime with
//! static entries always winning over discovered ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Window list for one field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    #[serde(default)]
    pub windows: Vec<String>,
}

impl FieldEntry {
    pub fn new(windows: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            windows: windows.into_iter().map(Into::into).collect(),
        }
    }
}

/// One topic's entry. A missing `fields` table means the topic is
/// subscribe-only until discovery supplies fields for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    #[serde(default)]
    pub fields: Option<BTreeMap<String, FieldEntry>>,
}

/// The whole analysis document: topic name → topic entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(flatten)]
    pub topics: BTreeMap<String, TopicEntry>,
}

impl AnalysisConfig {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Overlay discovered fields (topic → path → entry) onto this static
    /// document. A path already present statically keeps its static entry;
    /// everything else from discovery is added.
    pub fn merged_with(
        &self,
        discovered: &BTreeMap<String, BTreeMap<String, FieldEntry>>,
    ) -> AnalysisConfig {
        let mut merged = self.clone();
        for (topic, discovered_fields) in discovered {
            let entry = merged.topics.entry(topic.clone()).or_default();
            let fields = entry.fields.get_or_insert_with(BTreeMap::new);
            for (path, field_entry) in discovered_fields {
                fields
                    .entry(path.clone())
                    .or_insert_with(|| field_entry.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_config() -> AnalysisConfig {
        let mut topics = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), FieldEntry::new(["1h", "1d"]));
        topics.insert(
            "orders".to_string(),
            TopicEntry {
                fields: Some(fields),
            },
        );
        AnalysisConfig { topics }
    }

    #[test]
    fn deserializes_from_toml() {
        let doc = r#"
            [orders.fields."amount"]
            windows = ["1m", "1h"]

            [orders.fields."items.count"]
            windows = ["15m"]

            [heartbeats]
        "#;
        let config: AnalysisConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.topics.len(), 2);
        let orders = &config.topics["orders"];
        let fields = orders.fields.as_ref().unwrap();
        assert_eq!(fields["amount"].windows, vec!["1m", "1h"]);
        assert_eq!(fields["items.count"].windows, vec!["15m"]);
        assert!(config.topics["heartbeats"].fields.is_none());
    }

    #[test]
    fn deserializes_from_json() {
        let doc = r#"{"orders": {"fields": {"sub.one": {"windows": ["1m"]}}}}"#;
        let config: AnalysisConfig = serde_json::from_str(doc).unwrap();
        let fields = config.topics["orders"].fields.as_ref().unwrap();
        assert_eq!(fields["sub.one"].windows, vec!["1m"]);
    }

    #[test]
    fn merge_adds_discovered_paths() {
        let mut discovered = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("latency".to_string(), FieldEntry::new(["5m"]));
        discovered.insert("orders".to_string(), fields);

        let merged = static_config().merged_with(&discovered);
        let fields = merged.topics["orders"].fields.as_ref().unwrap();
        assert_eq!(fields["latency"].windows, vec!["5m"]);
        assert_eq!(fields["amount"].windows, vec!["1h", "1d"]);
    }

    #[test]
    fn merge_keeps_static_entry_on_conflict() {
        let mut discovered = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), FieldEntry::new(["5m"]));
        discovered.insert("orders".to_string(), fields);

        let merged = static_config().merged_with(&discovered);
        let fields = merged.topics["orders"].fields.as_ref().unwrap();
        // Static windows win over the discovered suggestion.
        assert_eq!(fields["amount"].windows, vec!["1h", "1d"]);
    }

    #[test]
    fn merge_creates_unknown_topics() {
        let mut discovered = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("two".to_string(), FieldEntry::new(["1m"]));
        discovered.insert("payments".to_string(), fields);

        let merged = static_config().merged_with(&discovered);
        assert!(merged.topics.contains_key("payments"));
        assert!(merged.topics["payments"].fields.is_some());
    }
}
