//! Routing of permanently failed translations.
//!
//! Each failed source text becomes one document in the quarantine
//! collection and one increment of the `to_retry` counter. Quarantined
//! items never reach the main collection. An NDJSON copy can be kept for
//! offline inspection.

mod mirror;
mod types;

pub use mirror::QuarantineMirror;
pub use types::{QuarantineRecord, QuarantineStats};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::pipeline::stats::{StatsUpdater, TO_RETRY};
use crate::store::{Document, DocumentStoreRef, FieldValue};
use crate::translate::FailureReason;

/// Field holding the attempt count of a quarantine document.
pub const ATTEMPTS_FIELD: &str = "attempts";
/// Field holding the terminal failure kind of a quarantine document.
pub const LAST_ERROR_FIELD: &str = "last_error";

pub struct QuarantineRouter {
    store: DocumentStoreRef,
    stats: StatsUpdater,
    collection: String,
    source_field: String,
    created_at_field: String,
    mirror: Option<QuarantineMirror>,
    totals: QuarantineStats,
}

impl QuarantineRouter {
    pub fn new(store: DocumentStoreRef, stats: StatsUpdater, config: &StoreConfig) -> Self {
        Self {
            store,
            stats,
            collection: config.quarantine_collection.clone(),
            source_field: config.fields.source_text.clone(),
            created_at_field: config.fields.created_at.clone(),
            mirror: None,
            totals: QuarantineStats::default(),
        }
    }

    pub fn with_mirror(mut self, mirror: Option<QuarantineMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    /// Write one quarantine document and bump the `to_retry` counter.
    ///
    /// The counter is only touched once the document is written.
    pub async fn quarantine(
        &mut self,
        source_text: &str,
        attempts: usize,
        last_error: FailureReason,
    ) -> Result<(), StoreError> {
        let document = Document::new()
            .with(self.source_field.as_str(), source_text)
            .with(ATTEMPTS_FIELD, attempts as i64)
            .with(LAST_ERROR_FIELD, last_error.as_str())
            .with(self.created_at_field.as_str(), FieldValue::ServerTimestamp);

        self.store.create(&self.collection, document).await?;
        self.stats.increment(TO_RETRY, 1).await;
        self.totals.increment(last_error);

        warn!(
            attempts,
            reason = last_error.as_str(),
            "Quarantined {:?} into {}",
            source_text,
            self.collection
        );

        if let Some(mirror) = &mut self.mirror {
            mirror.record(QuarantineRecord {
                source_text: source_text.to_string(),
                attempts,
                last_error,
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> QuarantineStats {
        self.totals
    }

    /// Flush the mirror and log totals by failure kind.
    pub async fn finalize(&self) -> QuarantineStats {
        if let Some(mirror) = &self.mirror
            && let Err(e) = mirror.flush().await
        {
            error!("Failed to write quarantine mirror: {}", e);
        }

        if self.totals.total() > 0 {
            info!(
                "Quarantine finalized: {} items (api_error={}, invalid_translation={})",
                self.totals.total(),
                self.totals.api_error,
                self.totals.invalid_translation
            );
        }
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn router(store: &Arc<MemoryStore>) -> QuarantineRouter {
        let config = StoreConfig::default();
        let stats = StatsUpdater::new(store.clone(), &config);
        QuarantineRouter::new(store.clone(), stats, &config)
    }

    #[tokio::test]
    async fn test_quarantine_writes_record_and_counter() {
        let store = Arc::new(MemoryStore::new());
        let mut router = router(&store);

        router
            .quarantine("Demat", 2, FailureReason::InvalidTranslation)
            .await
            .unwrap();

        let docs = store.documents("to_retry");
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].get("source_text").and_then(FieldValue::as_str),
            Some("Demat")
        );
        assert_eq!(
            docs[0].get(ATTEMPTS_FIELD).and_then(FieldValue::as_integer),
            Some(2)
        );
        assert_eq!(
            docs[0].get(LAST_ERROR_FIELD).and_then(FieldValue::as_str),
            Some("invalid_translation")
        );
        assert_eq!(store.counter("stats", "global", TO_RETRY), 1);
        assert_eq!(store.count("to_validate"), 0);
    }

    #[tokio::test]
    async fn test_finalize_reports_totals() {
        let store = Arc::new(MemoryStore::new());
        let mut router = router(&store);

        router.quarantine("a", 3, FailureReason::ApiError).await.unwrap();
        router.quarantine("b", 3, FailureReason::ApiError).await.unwrap();
        router
            .quarantine("c", 3, FailureReason::InvalidTranslation)
            .await
            .unwrap();

        let stats = router.finalize().await;
        assert_eq!(stats.api_error, 2);
        assert_eq!(stats.invalid_translation, 1);
        assert_eq!(store.counter("stats", "global", TO_RETRY), 3);
    }
}
