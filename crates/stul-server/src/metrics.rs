//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Connections registered (counter, labels: role).
pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Currently registered connections (gauge, labels: role).
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Host connections rejected during authentication (counter).
pub const AUTH_FAILURES_TOTAL: &str = "relay_auth_failures_total";
/// Messages received and broadcast (counter, labels: role of the sender).
pub const MESSAGES_RELAYED_TOTAL: &str = "relay_messages_relayed_total";
/// Broadcast deliveries that could not be queued (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "relay_broadcast_drops_total";
