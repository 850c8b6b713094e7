//! Compilation of the analysis document into an immutable rule table.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::duration::{format_duration, parse_duration};

/// One analysis window: integer seconds plus its human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSpec {
    pub secs: u64,
    pub label: String,
}

impl WindowSpec {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            secs,
            label: format_duration(secs),
        }
    }
}

/// Compiled rule for one field path of one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub path: String,
    /// Windows in configuration order.
    pub windows: Vec<WindowSpec>,
    /// Always the largest window of the field.
    pub retention_secs: u64,
}

/// The fully compiled analysis table. Immutable once built; replaced as a
/// whole on recompilation, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledDsl {
    /// Field rules per topic that carried a fields table. May be empty for
    /// a topic whose fields all failed to parse.
    topics: BTreeMap<String, Vec<FieldRule>>,
    /// Every configured topic, fields or not. This is the subscription set.
    subscribe: Vec<String>,
}

impl CompiledDsl {
    /// Compile a raw document. Never fails: bad windows and empty fields
    /// are dropped with a warning and everything else proceeds.
    pub fn compile(config: &AnalysisConfig) -> CompiledDsl {
        let mut topics = BTreeMap::new();
        let mut subscribe = Vec::new();

        for (topic, entry) in &config.topics {
            subscribe.push(topic.clone());

            let Some(fields) = &entry.fields else {
                debug!(topic = %topic, "no fields table, topic is subscribe-only");
                continue;
            };

            let mut rules = Vec::new();
            for (path, field) in fields {
                let mut windows = Vec::new();
                for raw in &field.windows {
                    match parse_duration(raw) {
                        Ok(secs) => windows.push(WindowSpec::from_secs(secs)),
                        Err(err) => {
                            warn!(topic = %topic, path = %path, window = %raw, %err, "dropping window");
                        }
                    }
                }

                if windows.is_empty() {
                    warn!(topic = %topic, path = %path, "no usable windows, dropping field");
                    continue;
                }

                let retention_secs = windows.iter().map(|w| w.secs).max().unwrap_or(0);
                rules.push(FieldRule {
                    path: path.clone(),
                    windows,
                    retention_secs,
                });
            }

            topics.insert(topic.clone(), rules);
        }

        debug!(
            topics = topics.len(),
            subscribed = subscribe.len(),
            "compiled analysis table"
        );
        CompiledDsl { topics, subscribe }
    }

    /// Field rules for a topic, `None` when the topic has no fields table.
    pub fn rules_for(&self, topic: &str) -> Option<&[FieldRule]> {
        self.topics.get(topic).map(|rules| rules.as_slice())
    }

    /// All configured topics, the subscription set.
    pub fn subscribe_topics(&self) -> &[String] {
        &self.subscribe
    }

    /// Every (topic, field, window) triple in the table, the scan unit.
    pub fn triples(&self) -> impl Iterator<Item = (&str, &FieldRule, &WindowSpec)> {
        self.topics.iter().flat_map(|(topic, rules)| {
            rules.iter().flat_map(move |rule| {
                rule.windows
                    .iter()
                    .map(move |window| (topic.as_str(), rule, window))
            })
        })
    }

    pub fn triple_count(&self) -> usize {
        self.triples().count()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.subscribe.is_empty()
    }
}
