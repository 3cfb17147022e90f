//! Sources panel state
//!
//! Read by the panel, written only by the chat controller.

use std::sync::Arc;

use parking_lot::RwLock;

use super::RetrievedDoc;

/// Shared "last retrieved sources" value
#[derive(Clone, Debug, Default)]
pub struct SharedSources {
    inner: Arc<RwLock<Vec<RetrievedDoc>>>,
}

impl SharedSources {
    /// Create an empty panel
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the displayed sources
    pub fn get(&self) -> Vec<RetrievedDoc> {
        self.inner.read().clone()
    }

    /// Whether nothing is displayed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub(crate) fn set(&self, documents: Vec<RetrievedDoc>) {
        *self.inner.write() = documents;
    }

    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }
}
