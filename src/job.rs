//! Background run behind a queryable handle.

use serde::Serialize;
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::RunSummary;

/// Lifecycle of the background run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed { summary: RunSummary },
    Cancelled { summary: RunSummary },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// Handle on a single spawned run.
///
/// The front end can read the status at any time and cancel the run through
/// the shared token; it shares no other state with the pipeline.
#[derive(Clone)]
pub struct JobHandle {
    status: watch::Receiver<JobStatus>,
    shutdown: CancellationToken,
}

impl JobHandle {
    /// Spawn `run` on the runtime. `shutdown` must be the token the run observes.
    pub fn spawn<F>(run: F, shutdown: CancellationToken) -> Self
    where
        F: Future<Output = Result<RunSummary, PipelineError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(JobStatus::Pending);

        tokio::spawn(async move {
            tx.send_replace(JobStatus::Running);
            info!("Ingestion job started");

            let status = match run.await {
                Ok(summary) if summary.cancelled => JobStatus::Cancelled { summary },
                Ok(summary) => JobStatus::Completed { summary },
                Err(e) => {
                    error!("Ingestion job failed: {}", e);
                    JobStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            tx.send_replace(status);
        });

        Self {
            status: rx,
            shutdown,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Request cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Wait until the run reaches a final state.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.status.clone();
        match rx.wait_for(JobStatus::is_finished).await {
            Ok(status) => status.clone(),
            // The task ended without reporting, e.g. it panicked.
            Err(_) => JobStatus::Failed {
                error: "job task exited unexpectedly".to_string(),
            },
        }
    }
}
