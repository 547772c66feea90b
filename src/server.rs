//! HTTP trigger surface.
//!
//! - `/` - static readiness message
//! - `/health` - liveness probe
//! - `/status` - JSON status of the background run
//! - `/metrics` - Prometheus metrics, when enabled

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, Router, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use snafu::prelude::*;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{AddressParseSnafu, BindSnafu, ServeSnafu, ServerError};
use crate::job::{JobHandle, JobStatus};

pub const READY_MESSAGE: &str = "troer: CSV import service is running\n";

#[derive(Clone)]
struct Metrics(Option<PrometheusHandle>);

/// Build the router for a running job.
pub fn router(job: JobHandle, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(job))
        .layer(Extension(Metrics(metrics)))
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    address: &str,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr: SocketAddr = address.parse().context(AddressParseSnafu { address })?;
    let listener = TcpListener::bind(addr)
        .await
        .context(BindSnafu { address })?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context(ServeSnafu)
}

async fn root_handler() -> &'static str {
    READY_MESSAGE
}

async fn health_handler() -> &'static str {
    "ok\n"
}

async fn status_handler(Extension(job): Extension<JobHandle>) -> Json<JobStatus> {
    Json(job.status())
}

async fn metrics_handler(Extension(Metrics(handle)): Extension<Metrics>) -> Response {
    match handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled\n").into_response(),
    }
}
