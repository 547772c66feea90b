//! In-process document store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;

use super::{Document, DocumentStore, FieldValue};

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Vec<(String, Document)>>,
    counters: HashMap<(String, String), BTreeMap<String, i64>>,
    writes: usize,
    commits: Vec<usize>,
}

/// A [`DocumentStore`] kept in memory.
///
/// Server timestamps are resolved to the local clock at write time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents of a collection in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .collections
            .get(collection)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(Vec::len)
            .unwrap_or_default()
    }

    /// Current value of a counter field, zero if never incremented.
    pub fn counter(&self, collection: &str, document: &str, field: &str) -> i64 {
        self.lock()
            .counters
            .get(&(collection.to_string(), document.to_string()))
            .and_then(|fields| fields.get(field).copied())
            .unwrap_or_default()
    }

    /// Sizes of the successful batch commits, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.lock().commits.clone()
    }

    /// Number of write operations of any kind.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn resolve(mut document: Document) -> Document {
    for value in document.fields.values_mut() {
        if *value == FieldValue::ServerTimestamp {
            *value = FieldValue::Timestamp(Utc::now());
        }
    }
    document
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn exists(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.lock().collections.get(collection).is_some_and(|docs| {
            docs.iter()
                .any(|(_, doc)| doc.get(field).and_then(FieldValue::as_str) == Some(value))
        }))
    }

    async fn commit(&self, collection: &str, documents: &[Document]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        docs.extend(
            documents
                .iter()
                .map(|doc| (Uuid::new_v4().to_string(), resolve(doc.clone()))),
        );
        inner.writes += 1;
        inner.commits.push(documents.len());
        Ok(())
    }

    async fn create(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push((Uuid::new_v4().to_string(), resolve(document)));
        inner.writes += 1;
        Ok(())
    }

    async fn increment(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        *inner
            .counters
            .entry((collection.to_string(), document.to_string()))
            .or_default()
            .entry(field.to_string())
            .or_default() += delta;
        inner.writes += 1;
        Ok(())
    }
}
