//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files (with environment variable
//! interpolation) and applying command-line overrides.

mod vars;

pub use vars::{InterpolationResult, interpolate};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{
    ConfigError, EmptyOriginSnafu, EmptySourceColumnSnafu, EmptySourcePathSnafu,
    EmptyTranslatorEndpointSnafu, EmptyTranslatorKeySnafu, EnvInterpolationSnafu,
    InvalidBatchSizeSnafu, InvalidDelimiterSnafu, MissingProjectIdSnafu, MissingTranslatorSnafu,
    ReadFileSnafu, YamlParseSnafu, ZeroMaxTriesSnafu,
};

/// Largest number of writes Firestore accepts in one commit.
pub const MAX_BATCH_SIZE: usize = 500;

/// Instruction sent with every translation request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an advanced machine translation system specializing in Breton-to-French translation.
Your task is to accurately translate Breton text into fluent and natural French while preserving the original meaning, nuances, and cultural context.
Ensure that the translations are grammatically correct and stylistically appropriate for the given text.
Translate only this text from Breton to French and return the response in JSON format as follows: {\"translation\": \"\"}.
No explanations, no extra words, only the JSON response.";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Translation service; required when `source.target_column` is unset.
    #[serde(default)]
    pub translator: Option<TranslatorConfig>,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where the tabular input lives and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Local path, `file://` URL or Azure blob URL of the CSV file.
    pub path: String,

    /// Column holding the source-language text (default: "br").
    #[serde(default = "default_source_column")]
    pub source_column: String,

    /// Column holding a ready-made translation. When unset every row is
    /// translated through the configured translator.
    #[serde(default)]
    pub target_column: Option<String>,

    /// Provenance tag stored on every ingested record.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Field delimiter (default: ',').
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Strip surrounding whitespace from cells before lookup and storage
    /// (default: true). Disable to match records written with padded text.
    #[serde(default = "default_trim")]
    pub trim: bool,

    /// Storage options (account, access key, connection string, ...).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

fn default_source_column() -> String {
    "br".to_string()
}

fn default_origin() -> String {
    "dsr1".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_trim() -> bool {
    true
}

/// Document store backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firestore,
    Memory,
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Google Cloud project hosting the Firestore database.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Firestore database id (default: "(default)").
    #[serde(default = "default_database")]
    pub database: String,

    /// Base URL override, e.g. the Firestore emulator at `http://localhost:8080`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// OAuth2 bearer token for the Firestore REST API.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,

    /// Main collection receiving translation records (default: "to_validate").
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Collection receiving quarantined items (default: "to_retry").
    #[serde(default = "default_quarantine_collection")]
    pub quarantine_collection: String,

    /// Collection holding the stats counter document (default: "stats").
    #[serde(default = "default_stats_collection")]
    pub stats_collection: String,

    /// Id of the stats counter document (default: "global").
    #[serde(default = "default_stats_document")]
    pub stats_document: String,

    /// Field names used when writing translation records.
    #[serde(default)]
    pub fields: FieldNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            project_id: None,
            database: default_database(),
            endpoint: None,
            access_token: None,
            timeout_secs: default_store_timeout_secs(),
            collection: default_collection(),
            quarantine_collection: default_quarantine_collection(),
            stats_collection: default_stats_collection(),
            stats_document: default_stats_document(),
            fields: FieldNames::default(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_store_timeout_secs() -> u64 {
    30
}

fn default_collection() -> String {
    "to_validate".to_string()
}

fn default_quarantine_collection() -> String {
    "to_retry".to_string()
}

fn default_stats_collection() -> String {
    "stats".to_string()
}

fn default_stats_document() -> String {
    "global".to_string()
}

/// Document field names of a translation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldNames {
    #[serde(default = "default_source_field")]
    pub source_text: String,
    #[serde(default = "default_target_field")]
    pub target_text: String,
    #[serde(default = "default_origin_field")]
    pub origin: String,
    #[serde(default = "default_created_at_field")]
    pub created_at: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            source_text: default_source_field(),
            target_text: default_target_field(),
            origin: default_origin_field(),
            created_at: default_created_at_field(),
        }
    }
}

fn default_source_field() -> String {
    "source_text".to_string()
}

fn default_target_field() -> String {
    "target_text".to_string()
}

fn default_origin_field() -> String {
    "origin".to_string()
}

fn default_created_at_field() -> String {
    "created_at".to_string()
}

/// Batch writer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Maximum records per atomic commit (default: 500).
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Log progress every this many input rows (default: 100).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_progress_interval() -> usize {
    100
}

/// Translation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorConfig {
    /// Base URL of the chat completions service.
    pub endpoint: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Model deployment name.
    #[serde(default)]
    pub model: Option<String>,

    /// Completion token limit (default: 2048).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_translator_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the built-in system instruction.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Retry policy applied per record.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl TranslatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_translator_timeout_secs() -> u64 {
    120
}

/// Delay schedule between translation attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per record, including the first (default: 2).
    #[serde(default = "default_max_tries")]
    pub max_tries: usize,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Fixed delay, or the first delay of an exponential schedule (default: 2000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Upper bound of an exponential schedule (default: 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor of an exponential schedule (default: 2.0).
    #[serde(default = "default_factor")]
    pub factor: f32,

    /// Add random jitter to every delay.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            backoff: BackoffKind::default(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            jitter: false,
        }
    }
}

fn default_max_tries() -> usize {
    2
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_factor() -> f32 {
    2.0
}

/// Quarantine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarantineConfig {
    /// Directory or blob prefix receiving an NDJSON copy of quarantined items.
    #[serde(default)]
    pub dlq_path: Option<String>,

    /// Storage options for the DLQ location.
    #[serde(default)]
    pub dlq_storage_options: HashMap<String, String>,
}

/// HTTP trigger surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Serve HTTP and run the ingestion in the background (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind (default: "0.0.0.0:8000").
    #[serde(default = "default_server_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_server_address(),
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0:8000".to_string()
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<String>,
    pub origin: Option<String>,
    pub web: bool,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_overrides(path, &Overrides::default())
    }

    /// Load configuration from a YAML file and apply command-line overrides.
    pub fn from_file_with_overrides(
        path: impl AsRef<Path>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        let mut config = Self::from_yaml(&content)?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text after environment variable interpolation.
    ///
    /// Validation is left to the caller so overrides can be applied first.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let result = interpolate(content);
        if !result.is_ok() {
            return EnvInterpolationSnafu {
                message: result.errors.join("\n"),
            }
            .fail();
        }
        serde_yaml::from_str(&result.text).context(YamlParseSnafu)
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(input) = &overrides.input {
            self.source.path = input.clone();
        }
        if let Some(origin) = &overrides.origin {
            self.source.origin = origin.clone();
        }
        if overrides.web {
            self.server.enabled = true;
        }
    }

    /// True when translations come from the translator instead of the file.
    pub fn is_predictive(&self) -> bool {
        self.source.target_column.is_none()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.path.trim().is_empty(), EmptySourcePathSnafu);
        ensure!(
            !self.source.source_column.trim().is_empty(),
            EmptySourceColumnSnafu
        );
        ensure!(!self.source.origin.trim().is_empty(), EmptyOriginSnafu);
        ensure!(
            self.source.delimiter.is_ascii(),
            InvalidDelimiterSnafu {
                delimiter: self.source.delimiter,
            }
        );
        ensure!(
            (1..=MAX_BATCH_SIZE).contains(&self.batch.size),
            InvalidBatchSizeSnafu {
                size: self.batch.size,
                max: MAX_BATCH_SIZE,
            }
        );

        match &self.translator {
            Some(translator) => {
                ensure!(
                    !translator.endpoint.trim().is_empty(),
                    EmptyTranslatorEndpointSnafu
                );
                ensure!(!translator.api_key.trim().is_empty(), EmptyTranslatorKeySnafu);
                ensure!(translator.retry.max_tries > 0, ZeroMaxTriesSnafu);
            }
            None => ensure!(!self.is_predictive(), MissingTranslatorSnafu),
        }

        if self.store.backend == StoreBackend::Firestore {
            let has_project = self
                .store
                .project_id
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty());
            ensure!(has_project, MissingProjectIdSnafu);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABULAR: &str = r#"
source:
  path: "data/br_fr.csv"
  target_column: fr
  origin: kerne
store:
  project_id: troer-dataset
  fields:
    source_text: br
    target_text: fr
    origin: source
    created_at: timestamp
"#;

    const PREDICTIVE: &str = r#"
source:
  path: "abfss://data@troer.dfs.core.windows.net/br_mono.csv"
  storage_options:
    connection_string: "AccountName=troer;AccountKey=a2V5"
store:
  backend: memory
translator:
  endpoint: "https://models.example.com"
  api_key: "k"
  model: DeepSeek-R1
  retry:
    max_tries: 3
    backoff: exponential
    delay_ms: 500
"#;

    #[test]
    fn test_tabular_config_defaults() {
        let config = Config::from_yaml(TABULAR).unwrap();
        config.validate().unwrap();

        assert!(!config.is_predictive());
        assert_eq!(config.source.source_column, "br");
        assert_eq!(config.source.target_column.as_deref(), Some("fr"));
        assert_eq!(config.source.delimiter, ',');
        assert!(config.source.trim);
        assert_eq!(config.batch.size, 500);
        assert_eq!(config.batch.progress_interval, 100);
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.collection, "to_validate");
        assert_eq!(config.store.quarantine_collection, "to_retry");
        assert_eq!(config.store.stats_collection, "stats");
        assert_eq!(config.store.stats_document, "global");
        assert_eq!(config.store.fields.source_text, "br");
        assert!(config.metrics.enabled);
        assert!(!config.server.enabled);
    }

    #[test]
    fn test_predictive_config() {
        let config = Config::from_yaml(PREDICTIVE).unwrap();
        config.validate().unwrap();

        assert!(config.is_predictive());
        let translator = config.translator.as_ref().unwrap();
        assert_eq!(translator.max_tokens, 2048);
        assert_eq!(translator.retry.max_tries, 3);
        assert_eq!(translator.retry.backoff, BackoffKind::Exponential);
        assert_eq!(translator.retry.max_delay_ms, 60_000);
        assert_eq!(translator.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.store.fields, FieldNames::default());
    }

    #[test]
    fn test_predictive_without_translator_is_rejected() {
        let config = Config::from_yaml(
            r#"
source:
  path: input.csv
store:
  backend: memory
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingTranslator)
        ));
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let mut config = Config::from_yaml(PREDICTIVE).unwrap();
        config.translator.as_mut().unwrap().api_key = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyTranslatorKey)
        ));
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = Config::from_yaml(TABULAR).unwrap();
        config.batch.size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBatchSize { size: 0, .. })
        ));
        config.batch.size = 501;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_firestore_requires_project() {
        let mut config = Config::from_yaml(TABULAR).unwrap();
        config.store.project_id = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProjectId)
        ));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = Config::from_yaml(
            r#"
source:
  path: input.csv
  target_column: fr
  colour: blue
"#,
        );
        assert!(matches!(result, Err(ConfigError::YamlParse { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::from_yaml(TABULAR).unwrap();
        config.apply(&Overrides {
            input: Some("other.csv".to_string()),
            origin: Some("manual".to_string()),
            web: true,
        });
        assert_eq!(config.source.path, "other.csv");
        assert_eq!(config.source.origin, "manual");
        assert!(config.server.enabled);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("troer.yaml");
        std::fs::write(&path, TABULAR).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source.origin, "kerne");

        let missing = Config::from_file(dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
