//! Document store abstraction.
//!
//! The pipeline only needs four operations from the store: an equality query
//! limited to one match, an atomic multi-document create, a single-document
//! create and a counter increment. [`DocumentStore`] captures exactly that,
//! with a Firestore REST backend and an in-process backend.

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;

/// A field value written by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    /// Resolved by the store at write time.
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// A document to create. The id is assigned by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Write and query surface used by the pipeline.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check that the store is reachable.
    async fn probe(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Whether a document in `collection` has `field == value`.
    async fn exists(&self, collection: &str, field: &str, value: &str)
    -> Result<bool, StoreError>;

    /// Create all documents atomically: either all persist or none do.
    async fn commit(&self, collection: &str, documents: &[Document]) -> Result<(), StoreError>;

    /// Create a single document.
    async fn create(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Add `delta` to an integer field, creating the document if needed.
    async fn increment(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError>;
}

pub type DocumentStoreRef = Arc<dyn DocumentStore>;

/// Build the configured backend.
pub fn from_config(config: &StoreConfig) -> Result<DocumentStoreRef, reqwest::Error> {
    Ok(match config.backend {
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(config)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::new()
            .with("br", "Demat")
            .with("attempts", 2i64)
            .with("timestamp", FieldValue::ServerTimestamp);

        assert_eq!(doc.get("br").and_then(FieldValue::as_str), Some("Demat"));
        assert_eq!(doc.get("attempts").and_then(FieldValue::as_integer), Some(2));
        assert_eq!(doc.get("timestamp"), Some(&FieldValue::ServerTimestamp));
        assert!(doc.get("fr").is_none());
    }

    #[test]
    fn test_memory_backend_from_config() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        assert!(from_config(&config).is_ok());
    }
}
