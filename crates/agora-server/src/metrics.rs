//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded. Fails if
/// another global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Recorder handle that is not installed globally. Used by tests and by
/// embedders that manage their own recorder.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket sessions opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections rejected before upgrade (counter, labels: reason).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// WebSocket sessions closed total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Actions received total (counter, labels: action).
pub const ACTION_REQUESTS_TOTAL: &str = "action_requests_total";
/// Actions answered with an error (counter, labels: action, `error_type`).
pub const ACTION_ERRORS_TOTAL: &str = "action_errors_total";
/// Action handling duration seconds (histogram, labels: action).
pub const ACTION_DURATION_SECONDS: &str = "action_duration_seconds";
/// Change events accepted over HTTP ingest (counter).
pub const INGEST_EVENTS_TOTAL: &str = "ingest_events_total";
/// HTTP ingest requests rejected (counter, labels: status).
pub const INGEST_REJECTED_TOTAL: &str = "ingest_rejected_total";
