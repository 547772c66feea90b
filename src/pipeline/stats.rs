//! Best-effort counter updates on the shared stats document.

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::emit;
use crate::metrics::events::CounterUpdateFailed;
use crate::store::DocumentStoreRef;

/// Counter of records waiting for validation in the main collection.
pub const TO_VALIDATE: &str = "to_validate";
/// Counter of quarantined records.
pub const TO_RETRY: &str = "to_retry";

/// Increments named counters on the stats document.
///
/// Increments are not linked to the writes they describe: a failure is
/// logged and reported, never rolled back or retried.
#[derive(Clone)]
pub struct StatsUpdater {
    store: DocumentStoreRef,
    collection: String,
    document: String,
}

impl StatsUpdater {
    pub fn new(store: DocumentStoreRef, config: &StoreConfig) -> Self {
        Self {
            store,
            collection: config.stats_collection.clone(),
            document: config.stats_document.clone(),
        }
    }

    /// Add `delta` to `counter`. Returns whether the update was applied.
    pub async fn increment(&self, counter: &'static str, delta: i64) -> bool {
        match self
            .store
            .increment(&self.collection, &self.document, counter, delta)
            .await
        {
            Ok(()) => {
                debug!(counter, delta, "Counter incremented");
                true
            }
            Err(e) => {
                warn!(
                    counter,
                    delta, "Failed to update {}/{}: {}", self.collection, self.document, e
                );
                emit!(CounterUpdateFailed { counter });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_increment_targets_configured_document() {
        let store = Arc::new(MemoryStore::new());
        let config = StoreConfig {
            stats_collection: "kontadennou".to_string(),
            stats_document: "hollek".to_string(),
            ..StoreConfig::default()
        };
        let stats = StatsUpdater::new(store.clone(), &config);

        assert!(stats.increment(TO_VALIDATE, 3).await);
        assert!(stats.increment(TO_RETRY, 1).await);

        assert_eq!(store.counter("kontadennou", "hollek", TO_VALIDATE), 3);
        assert_eq!(store.counter("kontadennou", "hollek", TO_RETRY), 1);
    }
}
