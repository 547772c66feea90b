//! Error types for troer using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

use crate::translate::FailureReason;

// ============ Storage Errors ============

/// Errors that can occur while fetching input objects.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// Azure configuration error.
    #[snafu(display("Azure configuration error: {source}"))]
    AzureConfig { source: object_store::Error },

    /// Unknown storage option key.
    #[snafu(display("Unknown storage option: {key}"))]
    UnknownOption { key: String },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Input path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Source column name is empty.
    #[snafu(display("Source column cannot be empty"))]
    EmptySourceColumn,

    /// Delimiter is not a single ASCII character.
    #[snafu(display("Delimiter must be a single ASCII character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: char },

    /// Origin tag is empty.
    #[snafu(display("Origin tag cannot be empty"))]
    EmptyOrigin,

    /// Batch size outside of the accepted range.
    #[snafu(display("Batch size must be between 1 and {max}, got {size}"))]
    InvalidBatchSize { size: usize, max: usize },

    /// Retry policy allows no attempt at all.
    #[snafu(display("translator.retry.max_tries must be at least 1"))]
    ZeroMaxTries,

    /// No target column and no translator: nothing can produce translations.
    #[snafu(display(
        "source.target_column is not set, so a translator section is required to produce translations"
    ))]
    MissingTranslator,

    /// Translator endpoint is empty.
    #[snafu(display("Translator endpoint cannot be empty"))]
    EmptyTranslatorEndpoint,

    /// Translator API key is empty.
    #[snafu(display("Translator API key cannot be empty"))]
    EmptyTranslatorKey,

    /// Firestore backend selected without a project.
    #[snafu(display("store.project_id is required for the firestore backend"))]
    MissingProjectId,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },
}

// ============ Source Errors ============

/// Errors raised while opening or reading the tabular input.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Input could not be fetched.
    #[snafu(display("Failed to fetch input {location}: {source}"))]
    Fetch {
        location: String,
        source: StorageError,
    },

    /// Header row could not be read.
    #[snafu(display("Failed to read CSV header: {source}"))]
    Header { source: csv::Error },

    /// Required columns are absent from the header.
    #[snafu(display("Input is missing required columns: {}", missing.join(", ")))]
    MissingColumns { missing: Vec<String> },

    /// A single row could not be decoded.
    #[snafu(display("Malformed CSV row {row}: {source}"))]
    Row { row: usize, source: csv::Error },

    /// A row has no source text.
    #[snafu(display("Row {row} has an empty source text"))]
    EmptySource { row: usize },
}

// ============ Translate Errors ============

/// Failure of a single translation attempt.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TranslateError {
    /// Connection error, timeout or body read failure.
    #[snafu(display("Translation request failed: {source}"))]
    Transport { source: reqwest::Error },

    /// The service answered with a non-success status.
    #[snafu(display("Translation service returned {status}: {body}"))]
    Status { status: u16, body: String },

    /// The service answered 2xx but without a completion.
    #[snafu(display("Translation service returned no completion"))]
    EmptyCompletion,

    /// The completion text is not a JSON object.
    #[snafu(display("Completion is not valid JSON: {source}"))]
    InvalidJson { source: serde_json::Error },

    /// The JSON object lacks a usable `translation` field.
    #[snafu(display("Completion has no usable 'translation' field"))]
    MissingTranslation,
}

impl TranslateError {
    /// Classify this attempt failure for quarantine reporting.
    pub fn reason(&self) -> FailureReason {
        match self {
            TranslateError::Transport { .. }
            | TranslateError::Status { .. }
            | TranslateError::EmptyCompletion => FailureReason::ApiError,
            TranslateError::InvalidJson { .. } | TranslateError::MissingTranslation => {
                FailureReason::InvalidTranslation
            }
        }
    }
}

// ============ Document Store Errors ============

/// Errors returned by document store backends.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// HTTP transport failure talking to the store.
    #[snafu(display("Store request failed: {source}"))]
    StoreTransport { source: reqwest::Error },

    /// The store rejected the request.
    #[snafu(display("Store returned {status}: {body}"))]
    StoreStatus { status: u16, body: String },

    /// The store response could not be decoded.
    #[snafu(display("Failed to decode store response: {source}"))]
    StoreDecode { source: serde_json::Error },

    /// The store refused the write (used by in-process backends).
    #[snafu(display("Store rejected write: {message}"))]
    Rejected { message: String },
}

// ============ Quarantine Errors ============

/// Errors that can occur while mirroring quarantined items to NDJSON.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix is intentional to avoid snafu selector conflicts (e.g., WriteSnafu)
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to write to DLQ.
    #[snafu(display("Failed to write to DLQ: {source}"))]
    DlqWrite { source: StorageError },

    /// Failed to serialize quarantine record.
    #[snafu(display("Failed to serialize DLQ record: {source}"))]
    DlqSerialize { source: serde_json::Error },

    /// Failed to create DLQ storage provider.
    #[snafu(display("Failed to create DLQ storage: {source}"))]
    DlqStorage { source: StorageError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder: {source}"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Server Errors ============

/// Errors from the HTTP trigger surface.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServerError {
    /// Address parsing error.
    #[snafu(display("Failed to parse address {address}: {source}"))]
    AddressParse {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Could not bind the listener.
    #[snafu(display("Failed to bind {address}: {source}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// The server loop exited with an error.
    #[snafu(display("HTTP server error: {source}"))]
    Serve { source: std::io::Error },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors that abort a run or prevent it from starting.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Input could not be opened or failed schema validation.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// Translator client could not be built.
    #[snafu(display("Failed to build translator client: {source}"))]
    TranslatorClient { source: reqwest::Error },

    /// Store client could not be built.
    #[snafu(display("Failed to build store client: {source}"))]
    StoreClient { source: reqwest::Error },

    /// Store is unreachable at startup.
    #[snafu(display("Document store is unreachable: {source}"))]
    StoreUnreachable { source: StoreError },

    /// DLQ error.
    #[snafu(display("DLQ error: {source}"))]
    Dlq { source: DlqError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// HTTP server error.
    #[snafu(display("Server error: {source}"))]
    Server { source: ServerError },
}

impl PipelineError {
    /// Returns true if this error was caused by the input schema.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Source {
                source: SourceError::MissingColumns { .. }
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_failures_are_classified() {
        let status = TranslateError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(status.reason(), FailureReason::ApiError);
        assert_eq!(
            TranslateError::MissingTranslation.reason(),
            FailureReason::InvalidTranslation
        );

        let json = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        assert_eq!(
            TranslateError::InvalidJson { source: json }.reason(),
            FailureReason::InvalidTranslation
        );
    }

    #[test]
    fn test_missing_columns_display() {
        let err = SourceError::MissingColumns {
            missing: vec!["br".to_string(), "fr".to_string()],
        };
        assert_eq!(err.to_string(), "Input is missing required columns: br, fr");

        let err = PipelineError::Source { source: err };
        assert!(err.is_schema_error());
    }
}
