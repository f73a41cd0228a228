//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Call once at
/// startup, before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Connections currently in the hub registry (gauge).
pub const CONNECTIONS_REGISTERED: &str = "relay_connections_registered";
/// Broadcast events processed by the hub (counter).
pub const BROADCASTS_TOTAL: &str = "relay_broadcasts_total";
/// Recipients dropped after a failed or timed-out write (counter).
pub const FANOUT_FAILURES_TOTAL: &str = "relay_fanout_failures_total";
/// Registrations abandoned during the name handshake (counter).
pub const HANDSHAKE_FAILURES_TOTAL: &str = "relay_handshake_failures_total";
/// Non-text frames received and ignored (counter).
pub const IGNORED_FRAMES_TOTAL: &str = "relay_ignored_frames_total";
