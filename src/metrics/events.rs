//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Terminal state of one input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Queued for the main collection.
    Queued,
    /// Already present in the main collection.
    Existing,
    /// Routed to the quarantine collection.
    Quarantined,
    /// Dropped because of a row or store error.
    Error,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Queued => "queued",
            RecordOutcome::Existing => "existing",
            RecordOutcome::Quarantined => "quarantined",
            RecordOutcome::Error => "error",
        }
    }
}

/// Event emitted when an input row reaches a terminal state.
pub struct RecordProcessed {
    pub outcome: RecordOutcome,
}

impl InternalEvent for RecordProcessed {
    fn emit(self) {
        trace!(outcome = self.outcome.as_str(), "Record processed");
        counter!("troer_records_total", "outcome" => self.outcome.as_str()).increment(1);
    }
}

/// Event emitted when a chunk is committed to the main collection.
pub struct BatchCommitted {
    pub size: usize,
    pub duration: Duration,
}

impl InternalEvent for BatchCommitted {
    fn emit(self) {
        trace!(
            size = self.size,
            duration_ms = self.duration.as_millis(),
            "Batch committed"
        );
        counter!("troer_batches_total", "status" => "committed").increment(1);
        counter!("troer_records_written_total").increment(self.size as u64);
        histogram!("troer_batch_commit_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a chunk commit fails.
pub struct BatchFailed {
    pub size: usize,
}

impl InternalEvent for BatchFailed {
    fn emit(self) {
        trace!(size = self.size, "Batch failed");
        counter!("troer_batches_total", "status" => "failed").increment(1);
    }
}

/// Outcome of a single translation attempt.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome {
    Success,
    ApiError,
    InvalidTranslation,
}

impl AttemptOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::ApiError => "api_error",
            AttemptOutcome::InvalidTranslation => "invalid_translation",
        }
    }
}

/// Event emitted after every call to the translation service.
pub struct TranslationAttempted {
    pub outcome: AttemptOutcome,
    pub duration: Duration,
}

impl InternalEvent for TranslationAttempted {
    fn emit(self) {
        trace!(
            outcome = self.outcome.as_str(),
            duration_ms = self.duration.as_millis(),
            "Translation attempted"
        );
        counter!("troer_translation_attempts_total", "outcome" => self.outcome.as_str())
            .increment(1);
        histogram!("troer_translation_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Document store operation type.
#[derive(Debug, Clone, Copy)]
pub enum StoreOperation {
    Query,
    Commit,
    Create,
    Increment,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Query => "query",
            StoreOperation::Commit => "commit",
            StoreOperation::Create => "create",
            StoreOperation::Increment => "increment",
        }
    }
}

/// Status of a store request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a document store request completes.
pub struct StoreRequest {
    pub operation: StoreOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StoreRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Store request"
        );
        counter!(
            "troer_store_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "troer_store_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a stats counter increment fails.
pub struct CounterUpdateFailed {
    pub counter: &'static str,
}

impl InternalEvent for CounterUpdateFailed {
    fn emit(self) {
        trace!(counter = self.counter, "Counter update failed");
        counter!("troer_counter_update_failures_total", "counter" => self.counter).increment(1);
    }
}

/// Event emitted when the pending batch changes size.
pub struct PendingRecords {
    pub count: usize,
}

impl InternalEvent for PendingRecords {
    fn emit(self) {
        gauge!("troer_pending_records").set(self.count as f64);
    }
}
