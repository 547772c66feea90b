//! Metrics and observability infrastructure for troer.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `install`: Prometheus recorder installation; rendering happens on the
//!   HTTP trigger surface (`/metrics`)

pub mod events;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Install the global Prometheus recorder.
///
/// The returned handle renders the text exposition format.
pub fn install() -> Result<PrometheusHandle, MetricsError> {
    PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)
}

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding Prometheus metric.
///
/// ```ignore
/// use troer::metrics::events::{RecordOutcome, RecordProcessed};
///
/// emit!(RecordProcessed { outcome: RecordOutcome::Existing });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
