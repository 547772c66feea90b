//! Existence check against the main collection.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::DocumentStoreRef;

/// Rejects source texts already present in the main collection.
///
/// The check is a query followed later by a separate write, so two runs
/// racing on the same text can both pass it.
#[derive(Clone)]
pub struct DedupGate {
    store: DocumentStoreRef,
    collection: String,
    field: String,
}

impl DedupGate {
    pub fn new(store: DocumentStoreRef, config: &StoreConfig) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
            field: config.fields.source_text.clone(),
        }
    }

    pub async fn exists(&self, source_text: &str) -> Result<bool, StoreError> {
        self.store
            .exists(&self.collection, &self.field, source_text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, DocumentStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_exists_uses_configured_field() {
        let store = Arc::new(MemoryStore::new());
        store
            .commit("to_validate", &[Document::new().with("source_text", "Demat")])
            .await
            .unwrap();
        store
            .commit("other", &[Document::new().with("source_text", "Kenavo")])
            .await
            .unwrap();

        let gate = DedupGate::new(store, &StoreConfig::default());
        assert!(gate.exists("Demat").await.unwrap());
        assert!(!gate.exists("Kenavo").await.unwrap());
        assert!(!gate.exists("demat").await.unwrap());
    }
}
