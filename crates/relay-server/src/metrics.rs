//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle the `/metrics` endpoint renders from. Fails if another
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Connections opened (counter, labels: role).
pub const WS_CONNECTIONS_TOTAL: &str = "relay_ws_connections_total";
/// Connections closed (counter, labels: role).
pub const WS_DISCONNECTIONS_TOTAL: &str = "relay_ws_disconnections_total";
/// Open connections (gauge, labels: role).
pub const WS_CONNECTIONS_ACTIVE: &str = "relay_ws_connections_active";
/// Connection lifetime (histogram, labels: role).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "relay_ws_connection_duration_seconds";
/// Inbound frames published to the core (counter, labels: tag).
pub const FRAMES_IN_TOTAL: &str = "relay_frames_in_total";
/// Inbound frames rejected (counter, labels: reason).
pub const FRAMES_REJECTED_TOTAL: &str = "relay_frames_rejected_total";
/// Outbound frames queued on a socket (counter, labels: delivery).
pub const FRAMES_OUT_TOTAL: &str = "relay_frames_out_total";
/// Targeted sends dropped because the player was gone (counter).
pub const TARGETED_DROPS_TOTAL: &str = "relay_targeted_drops_total";
/// Players closed because the host left (counter).
pub const CASCADE_CLOSES_TOTAL: &str = "relay_cascade_closes_total";
/// Player-left notifications published (counter).
pub const PLAYER_LEFT_TOTAL: &str = "relay_player_left_total";
