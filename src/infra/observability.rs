//! Tracing and Prometheus metrics setup.
//!
//! Request counters are recorded by the service layer through the `metrics`
//! facade; this module installs the recorder and the log subscriber.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus handle for on-demand scrape output (e.g. GET /metrics).
pub type PrometheusHandle = metrics_exporter_prometheus::PrometheusHandle;

const DEFAULT_FILTER: &str = "evm_rpc_facade=info,tower_http=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. With `json` set, events are
/// emitted as one JSON object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    // try_init: a subscriber may already be set in tests
    if json {
        let _ = registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init();
    } else {
        let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
    }
}

/// Install the global metrics recorder and return a handle for rendering.
///
/// Uses `PrometheusBuilder` without an HTTP listener; the application
/// exposes metrics via GET /metrics using `handle.render()`.
///
/// # Errors
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Convenience to wrap the handle in Arc for shared use in app state.
#[must_use]
pub fn init_metrics_handle() -> Option<Arc<PrometheusHandle>> {
    init_metrics().ok().map(Arc::new)
}

/// Record the outcome of one facade operation.
pub fn record_rpc_request(operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("rpc_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}
