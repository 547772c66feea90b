//! Chunked, atomic writes to the main collection.

use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{FieldNames, StoreConfig};
use crate::emit;
use crate::metrics::events::{BatchCommitted, BatchFailed, PendingRecords};
use crate::store::{Document, DocumentStoreRef, FieldValue};

use super::stats::{StatsUpdater, TO_VALIDATE};

/// A validated, non-duplicate pair waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    pub source_text: String,
    pub target_text: String,
    pub origin: String,
}

impl TranslationRecord {
    fn to_document(&self, fields: &FieldNames) -> Document {
        Document::new()
            .with(fields.source_text.as_str(), self.source_text.as_str())
            .with(fields.target_text.as_str(), self.target_text.as_str())
            .with(fields.origin.as_str(), self.origin.as_str())
            .with(fields.created_at.as_str(), FieldValue::ServerTimestamp)
    }
}

/// Outcome of one or more chunk commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Records persisted.
    pub committed: usize,
    /// Records lost with a failed chunk.
    pub failed: usize,
    pub chunks_committed: usize,
    pub chunks_failed: usize,
}

impl CommitResult {
    pub fn merge(&mut self, other: CommitResult) {
        self.committed += other.committed;
        self.failed += other.failed;
        self.chunks_committed += other.chunks_committed;
        self.chunks_failed += other.chunks_failed;
    }
}

/// Accumulates records and commits them in chunks of at most `batch_size`.
///
/// Each chunk is a single atomic store commit followed by one increment of
/// the `to_validate` counter. A failed chunk is dropped and does not touch
/// the counter.
pub struct BatchWriter {
    store: DocumentStoreRef,
    stats: StatsUpdater,
    collection: String,
    fields: FieldNames,
    batch_size: usize,
    pending: Vec<TranslationRecord>,
    pending_keys: HashSet<String>,
}

impl BatchWriter {
    pub fn new(
        store: DocumentStoreRef,
        stats: StatsUpdater,
        config: &StoreConfig,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            stats,
            collection: config.collection.clone(),
            fields: config.fields.clone(),
            batch_size,
            pending: Vec::with_capacity(batch_size),
            pending_keys: HashSet::new(),
        }
    }

    /// Whether a record with this source text is waiting in the current chunk.
    pub fn is_pending(&self, source_text: &str) -> bool {
        self.pending_keys.contains(source_text)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue a record, committing the chunk once it is full.
    pub async fn push(&mut self, record: TranslationRecord) -> Option<CommitResult> {
        self.pending_keys.insert(record.source_text.clone());
        self.pending.push(record);
        emit!(PendingRecords {
            count: self.pending.len()
        });

        if self.pending.len() >= self.batch_size {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Commit whatever is pending.
    pub async fn flush(&mut self) -> CommitResult {
        if self.pending.is_empty() {
            return CommitResult::default();
        }
        let chunk = std::mem::take(&mut self.pending);
        self.pending_keys.clear();
        emit!(PendingRecords { count: 0 });
        self.commit_chunk(&chunk).await
    }

    /// Commit a full record sequence, split into consecutive chunks.
    ///
    /// Chunks are independent: a failed chunk is reported and the next one
    /// is still attempted.
    pub async fn commit(&mut self, records: &[TranslationRecord]) -> CommitResult {
        let mut result = CommitResult::default();
        for chunk in records.chunks(self.batch_size) {
            result.merge(self.commit_chunk(chunk).await);
        }
        result
    }

    async fn commit_chunk(&self, chunk: &[TranslationRecord]) -> CommitResult {
        let documents: Vec<Document> = chunk
            .iter()
            .map(|record| record.to_document(&self.fields))
            .collect();
        let size = documents.len();

        let start = Instant::now();
        match self.store.commit(&self.collection, &documents).await {
            Ok(()) => {
                emit!(BatchCommitted {
                    size,
                    duration: start.elapsed(),
                });
                info!("Committed batch of {} records to {}", size, self.collection);
                self.stats.increment(TO_VALIDATE, size as i64).await;
                CommitResult {
                    committed: size,
                    chunks_committed: 1,
                    ..CommitResult::default()
                }
            }
            Err(e) => {
                emit!(BatchFailed { size });
                warn!(
                    "Batch of {} records to {} failed, counting them as errors: {}",
                    size, self.collection, e
                );
                debug!(first = ?chunk.first().map(|r| &r.source_text), "Failed batch");
                CommitResult {
                    failed: size,
                    chunks_failed: 1,
                    ..CommitResult::default()
                }
            }
        }
    }
}
