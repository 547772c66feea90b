//! troer: CSV and machine-translation ingestion into Firestore.
//!
//! Runs one ingestion per process. With `--web`, the run is started in the
//! background behind a small HTTP surface that keeps serving until a
//! shutdown signal arrives.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use troer::config::{Config, Overrides};
use troer::error::{ConfigSnafu, MetricsSnafu, PipelineError, ServerSnafu};
use troer::{JobHandle, init_tracing, metrics, pipeline, server, signal};

/// Bilingual corpus ingestion tool.
#[derive(Parser, Debug)]
#[command(name = "troer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Input file or blob URL, overriding `source.path`.
    #[arg(short, long)]
    input: Option<String>,

    /// Provenance tag, overriding `source.origin`.
    #[arg(long)]
    origin: Option<String>,

    /// Serve the HTTP trigger surface and run the import in the background.
    #[arg(long)]
    web: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration and input without writing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("troer starting");

    let config = build_config(&args)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration and input");
        info!("Source: {}", config.source.path);
        info!(
            "Target column: {}",
            config.source.target_column.as_deref().unwrap_or("<translator>")
        );
        info!("Store: {:?}/{}", config.store.backend, config.store.collection);
        pipeline::dry_run(&config).await?;
        info!("Configuration is valid");
        return Ok(());
    }

    let prometheus = if config.metrics.enabled {
        let handle = metrics::install().context(MetricsSnafu)?;
        debug!("Prometheus recorder installed");
        Some(handle)
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    if config.server.enabled {
        let address = config.server.address.clone();
        let job = JobHandle::spawn(
            pipeline::run_pipeline(config, shutdown.clone()),
            shutdown.clone(),
        );
        let app = server::router(job.clone(), prometheus);

        server::serve(&address, app, async move { shutdown.cancelled().await })
            .await
            .context(ServerSnafu)?;

        let status = job.wait().await;
        info!("Final job status: {:?}", status);
        return Ok(());
    }

    let summary = pipeline::run_pipeline(config, shutdown).await?;
    info!("Pipeline finished");
    info!("  Rows: {}", summary.total);
    info!("  Added: {}", summary.added);
    info!("  Existing: {}", summary.existing);
    info!("  Errors: {}", summary.errors);
    info!("  Quarantined: {}", summary.quarantined);

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    let overrides = Overrides {
        input: args.input.clone(),
        origin: args.origin.clone(),
        web: args.web,
    };
    Config::from_file_with_overrides(&args.config, &overrides).context(ConfigSnafu)
}
