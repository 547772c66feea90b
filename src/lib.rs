//! troer: ingest bilingual text pairs into a shared document store.
//!
//! Rows come from a delimited file (local or Azure Blob Storage). Missing
//! translations are requested from a chat-completions service with bounded
//! retries. Every record is checked against the main collection before it
//! is written in atomic chunks, counted on a shared stats document, or
//! routed to a quarantine collection when no translation could be obtained.
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use troer::{Config, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("troer.yaml")?;
//!     let summary = run_pipeline(config, CancellationToken::new()).await?;
//!     println!("Added {} records", summary.added);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod quarantine;
pub mod server;
pub mod signal;
pub mod source;
pub mod storage;
pub mod store;
pub mod translate;

use tracing_subscriber::EnvFilter;

// Re-export main types
pub use config::Config;
pub use job::{JobHandle, JobStatus};
pub use pipeline::{Pipeline, RunSummary, run_pipeline};
pub use storage::{StorageProvider, StorageProviderRef};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
