//! Main ingestion pipeline.
//!
//! Rows flow through the stages one at a time:
//!
//! ```text
//! RecordSource -> (Translator) -> DedupGate -> BatchWriter + StatsUpdater
//!                       \
//!                        `-> QuarantineRouter
//! ```
//!
//! Records are processed sequentially so that each existence check sees the
//! writes of the records before it. The shutdown token is checked between
//! rows and between translation attempts; the chunk already accumulated is
//! still committed before the run returns.

pub mod dedup;
pub mod stats;
pub mod writer;

use serde::Serialize;
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::emit;
use crate::error::{
    DlqSnafu, PipelineError, SourceSnafu, StoreClientSnafu, StoreUnreachableSnafu,
    TranslatorClientSnafu,
};
use crate::metrics::events::{RecordOutcome, RecordProcessed};
use crate::quarantine::{QuarantineMirror, QuarantineRouter};
use crate::source::{RecordSource, SourceRow, Variant};
use crate::store::{self, DocumentStoreRef};
use crate::translate::{TranslationOutcome, Translator};

use dedup::DedupGate;
use stats::StatsUpdater;
use writer::{BatchWriter, CommitResult, TranslationRecord};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rows read from the input.
    pub total: usize,
    /// Records persisted in the main collection.
    pub added: usize,
    /// Rows skipped because their source text was already present.
    pub existing: usize,
    /// Rows dropped by a row, store or batch error.
    pub errors: usize,
    /// Rows routed to the quarantine collection.
    pub quarantined: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    /// Whether the run stopped early on shutdown.
    pub cancelled: bool,
}

impl RunSummary {
    fn apply(&mut self, result: CommitResult) {
        self.added += result.committed;
        self.errors += result.failed;
        self.batches_committed += result.chunks_committed;
        self.batches_failed += result.chunks_failed;
    }
}

/// What happened to a single row.
enum RowOutcome {
    Queued(Option<CommitResult>),
    Existing,
    Quarantined,
    Error,
    Cancelled,
}

/// A single ingestion run over one input.
pub struct Pipeline {
    source: RecordSource,
    origin: String,
    translator: Option<Translator>,
    dedup: DedupGate,
    writer: BatchWriter,
    quarantine: QuarantineRouter,
    progress_interval: usize,
    summary: RunSummary,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        source: RecordSource,
        store: DocumentStoreRef,
        translator: Option<Translator>,
        shutdown: CancellationToken,
    ) -> Self {
        let stats = StatsUpdater::new(store.clone(), &config.store);
        let dedup = DedupGate::new(store.clone(), &config.store);
        let writer = BatchWriter::new(
            store.clone(),
            stats.clone(),
            &config.store,
            config.batch.size,
        );
        let quarantine = QuarantineRouter::new(store, stats, &config.store);

        Self {
            source,
            origin: config.source.origin.clone(),
            translator,
            dedup,
            writer,
            quarantine,
            progress_interval: config.batch.progress_interval.max(1),
            summary: RunSummary::default(),
            shutdown,
        }
    }

    /// Mirror quarantined items to NDJSON.
    pub fn with_mirror(mut self, mirror: Option<QuarantineMirror>) -> Self {
        self.quarantine = self.quarantine.with_mirror(mirror);
        self
    }

    /// Process every row, then commit the remaining chunk.
    pub async fn run(mut self) -> RunSummary {
        let variant = self.source.variant();
        info!(
            "Starting ingestion ({:?}, origin={}, translator={})",
            variant,
            self.origin,
            self.translator.is_some()
        );

        let source = self.source.clone();
        for row in source.rows() {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, stopping before row {}", self.summary.total);
                self.summary.cancelled = true;
                break;
            }

            self.summary.total += 1;
            let outcome = match row {
                Ok(row) => self.process_row(row).await,
                Err(e) => {
                    warn!("Skipping row: {}", e);
                    RowOutcome::Error
                }
            };

            match outcome {
                RowOutcome::Queued(result) => {
                    emit!(RecordProcessed {
                        outcome: RecordOutcome::Queued
                    });
                    if let Some(result) = result {
                        self.summary.apply(result);
                    }
                }
                RowOutcome::Existing => {
                    self.summary.existing += 1;
                    emit!(RecordProcessed {
                        outcome: RecordOutcome::Existing
                    });
                }
                RowOutcome::Quarantined => {
                    self.summary.quarantined += 1;
                    emit!(RecordProcessed {
                        outcome: RecordOutcome::Quarantined
                    });
                }
                RowOutcome::Error => {
                    self.summary.errors += 1;
                    emit!(RecordProcessed {
                        outcome: RecordOutcome::Error
                    });
                }
                RowOutcome::Cancelled => {
                    // The row was read but never reached a terminal state.
                    self.summary.total -= 1;
                    self.summary.cancelled = true;
                    info!("Shutdown requested during translation, stopping");
                    break;
                }
            }

            if self.summary.total % self.progress_interval == 0 {
                self.log_progress();
            }
        }

        let result = self.writer.flush().await;
        self.summary.apply(result);
        self.quarantine.finalize().await;

        let s = &self.summary;
        info!(
            "Ingestion {}: {} rows, {} added, {} existing, {} errors, {} quarantined ({} batches committed, {} failed)",
            if s.cancelled { "cancelled" } else { "complete" },
            s.total,
            s.added,
            s.existing,
            s.errors,
            s.quarantined,
            s.batches_committed,
            s.batches_failed
        );
        self.summary
    }

    async fn process_row(&mut self, row: SourceRow) -> RowOutcome {
        let SourceRow {
            index,
            source_text,
            target_text,
        } = row;

        if self.writer.is_pending(&source_text) {
            debug!(row = index, "Duplicate of a queued record");
            return RowOutcome::Existing;
        }

        match self.dedup.exists(&source_text).await {
            Ok(true) => return RowOutcome::Existing,
            Ok(false) => {}
            Err(e) => {
                warn!(row = index, "Existence check failed, skipping row: {}", e);
                return RowOutcome::Error;
            }
        }

        let target_text = match target_text {
            Some(text) => text,
            None => match self.obtain_translation(index, &source_text).await {
                Ok(text) => text,
                Err(outcome) => return outcome,
            },
        };

        let record = TranslationRecord {
            source_text,
            target_text,
            origin: self.origin.clone(),
        };
        RowOutcome::Queued(self.writer.push(record).await)
    }

    /// Ask the translator, routing exhausted retries to quarantine.
    async fn obtain_translation(
        &mut self,
        index: usize,
        source_text: &str,
    ) -> Result<String, RowOutcome> {
        let Some(translator) = &self.translator else {
            warn!(row = index, "Row has no translation and no translator is configured");
            return Err(RowOutcome::Error);
        };

        match translator.translate(source_text, &self.shutdown).await {
            TranslationOutcome::Translated { text, attempts } => {
                debug!(row = index, attempts, "Translated");
                Ok(text)
            }
            TranslationOutcome::Failed(failure) => {
                match self
                    .quarantine
                    .quarantine(source_text, failure.attempts, failure.reason)
                    .await
                {
                    Ok(()) => Err(RowOutcome::Quarantined),
                    Err(e) => {
                        warn!(row = index, "Failed to write quarantine record: {}", e);
                        Err(RowOutcome::Error)
                    }
                }
            }
            TranslationOutcome::Cancelled => Err(RowOutcome::Cancelled),
        }
    }

    fn log_progress(&self) {
        let s = &self.summary;
        info!(
            "Processed {} rows ({} queued, {} added, {} existing, {} errors, {} quarantined)",
            s.total,
            self.writer.pending_len(),
            s.added,
            s.existing,
            s.errors,
            s.quarantined
        );
    }
}

/// Build every component from configuration and run one ingestion.
///
/// The input schema is validated and the store probed before anything is
/// written; either failure aborts the run.
pub async fn run_pipeline(
    config: Config,
    shutdown: CancellationToken,
) -> Result<RunSummary, PipelineError> {
    let source = RecordSource::open(&config.source)
        .await
        .context(SourceSnafu)?;
    if source.variant() == Variant::Predictive && config.translator.is_none() {
        warn!("Input has no translation column and no translator is configured");
    }

    let store = store::from_config(&config.store).context(StoreClientSnafu)?;
    store.probe().await.context(StoreUnreachableSnafu)?;

    let translator = config
        .translator
        .as_ref()
        .map(Translator::from_config)
        .transpose()
        .context(TranslatorClientSnafu)?;

    let mirror = QuarantineMirror::from_config(&config.quarantine)
        .await
        .context(DlqSnafu)?;

    let pipeline = Pipeline::new(&config, source, store, translator, shutdown).with_mirror(mirror);
    Ok(pipeline.run().await)
}

/// Validate the input without writing anything.
pub async fn dry_run(config: &Config) -> Result<usize, PipelineError> {
    let source = RecordSource::open(&config.source)
        .await
        .context(SourceSnafu)?;
    let rows = source.row_count();
    info!("Input {} is valid: {} rows, {:?}", config.source.path, rows, source.variant());
    Ok(rows)
}
