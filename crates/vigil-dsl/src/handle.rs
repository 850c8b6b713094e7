//! Shared handle to the current compiled table.
//!
//! Readers take an `Arc` snapshot and keep working against it even if a
//! recompile lands mid-flight; `install` swaps the pointer in one step. The
//! handle starts empty, which is how the scan scheduler knows nothing has
//! been compiled yet.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::compiler::CompiledDsl;

/// Cloneable handle to the current [`CompiledDsl`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct DslHandle {
    inner: Arc<RwLock<Option<Arc<CompiledDsl>>>>,
}

impl DslHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly compiled table.
    pub async fn install(&self, dsl: CompiledDsl) {
        *self.inner.write().await = Some(Arc::new(dsl));
    }

    /// The current snapshot, `None` until the first install.
    pub async fn load(&self) -> Option<Arc<CompiledDsl>> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[tokio::test]
    async fn starts_empty() {
        let handle = DslHandle::new();
        assert!(handle.load().await.is_none());
    }

    #[tokio::test]
    async fn snapshots_survive_a_swap() {
        let handle = DslHandle::new();
        handle.install(CompiledDsl::default()).await;

        let before = handle.load().await.unwrap();
        handle
            .install(CompiledDsl::compile(&AnalysisConfig::default()))
            .await;
        let after = handle.load().await.unwrap();

        // The old snapshot is still usable; the handle moved on.
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.is_empty());
    }
}
