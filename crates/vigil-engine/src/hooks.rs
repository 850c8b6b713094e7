//! Caller-supplied hooks.
//!
//! Hooks are code, not configuration: the embedding application hands
//! them to `Engine::new` and they run synchronously at three points of the
//! pipeline. Each returns a tagged [`HookResult`] so a hook can transform
//! the value, drop it silently, or fail; failures surface as error events
//! and the pipeline keeps going.

use std::sync::Arc;

use vigil_core::{Anomaly, StreamMessage};
use vigil_dsl::FieldEntry;

/// Outcome of one hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult<T> {
    /// Continue with this (possibly altered) value.
    Transformed(T),
    /// Discard the value at this stage, quietly.
    Dropped,
    /// Discard the value and surface the error.
    Failed(String),
}

/// Runs on every consumed message before persistence or scoring.
pub type MessageHook = Arc<dyn Fn(StreamMessage) -> HookResult<StreamMessage> + Send + Sync>;

/// Runs on every detected anomaly before it is counted, emitted or
/// produced.
pub type AnomalyHook = Arc<dyn Fn(Anomaly) -> HookResult<Anomaly> + Send + Sync>;

/// Maps a discovered `(topic, path)` to the field entry it should be
/// analysed with.
pub type FieldConfigHook = Arc<dyn Fn(&str, &str) -> HookResult<FieldEntry> + Send + Sync>;

/// The hook bundle handed to the engine. `before_message` is mandatory:
/// construction fails without one. The others default to pass-through
/// behavior.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_message: Option<MessageHook>,
    pub before_anomaly: Option<AnomalyHook>,
    pub discovery_field_config: Option<FieldConfigHook>,
}

impl Hooks {
    /// The identity message hook and defaults for everything else.
    pub fn passthrough() -> Self {
        Self::default().with_before_message(HookResult::Transformed)
    }

    pub fn with_before_message<F>(mut self, hook: F) -> Self
    where
        F: Fn(StreamMessage) -> HookResult<StreamMessage> + Send + Sync + 'static,
    {
        self.before_message = Some(Arc::new(hook));
        self
    }

    pub fn with_before_anomaly<F>(mut self, hook: F) -> Self
    where
        F: Fn(Anomaly) -> HookResult<Anomaly> + Send + Sync + 'static,
    {
        self.before_anomaly = Some(Arc::new(hook));
        self
    }

    pub fn with_discovery_field_config<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) -> HookResult<FieldEntry> + Send + Sync + 'static,
    {
        self.discovery_field_config = Some(Arc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Payload;

    #[test]
    fn passthrough_keeps_the_message_intact() {
        let hooks = Hooks::passthrough();
        let hook = hooks.before_message.unwrap();
        let message = StreamMessage::new("orders", Payload::Number(1.0), 42);
        match hook(message.clone()) {
            HookResult::Transformed(out) => assert_eq!(out, message),
            other => panic!("unexpected hook result: {other:?}"),
        }
    }

    #[test]
    fn builder_registers_each_hook() {
        let hooks = Hooks::passthrough()
            .with_before_anomaly(HookResult::Transformed)
            .with_discovery_field_config(|_, _| HookResult::Dropped);
        assert!(hooks.before_message.is_some());
        assert!(hooks.before_anomaly.is_some());
        assert!(hooks.discovery_field_config.is_some());
    }
}
