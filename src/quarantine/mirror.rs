//! NDJSON mirror of quarantined items.
//!
//! Collects every quarantined item of a run and writes them as one NDJSON
//! object to the configured storage location when the run finishes.

use bytes::Bytes;
use chrono::Utc;
use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::config::QuarantineConfig;
use crate::error::{DlqError, DlqSerializeSnafu, DlqStorageSnafu, DlqWriteSnafu};
use crate::storage::StorageProvider;

use super::types::QuarantineRecord;

pub struct QuarantineMirror {
    storage: StorageProvider,
    filename: String,
    records: Vec<QuarantineRecord>,
}

impl QuarantineMirror {
    /// Returns `None` if no mirror path is configured.
    pub async fn from_config(config: &QuarantineConfig) -> Result<Option<Self>, DlqError> {
        let Some(dlq_path) = &config.dlq_path else {
            return Ok(None);
        };

        let storage =
            StorageProvider::for_url_with_options(dlq_path, config.dlq_storage_options.clone())
                .await
                .context(DlqStorageSnafu)?;

        let filename = format!("quarantine-{}.ndjson", Utc::now().format("%Y%m%d-%H%M%S"));
        info!("Quarantine mirror enabled: {}/{}", dlq_path, filename);

        Ok(Some(Self {
            storage,
            filename,
            records: Vec::new(),
        }))
    }

    pub fn record(&mut self, record: QuarantineRecord) {
        debug!(source_text = %record.source_text, "Mirroring quarantined item");
        self.records.push(record);
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Write all collected records. Nothing is written for an empty run.
    pub async fn flush(&self) -> Result<usize, DlqError> {
        if self.records.is_empty() {
            return Ok(0);
        }

        let mut ndjson = String::new();
        for record in &self.records {
            let line = serde_json::to_string(record).context(DlqSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        let path = Path::from(self.filename.as_str());
        self.storage
            .put_payload(&path, PutPayload::from(Bytes::from(ndjson)))
            .await
            .context(DlqWriteSnafu)?;

        info!(
            "Wrote {} quarantined items to {}",
            self.records.len(),
            self.filename
        );
        Ok(self.records.len())
    }
}
