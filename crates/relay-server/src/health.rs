//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the relay is running.
    pub status: String,
    /// Seconds since the relay started.
    pub uptime_secs: u64,
    /// Open host connections.
    pub hosts: usize,
    /// Registered players.
    pub players: usize,
}

/// Build a health response from live counts.
pub fn health_check(start_time: Instant, hosts: usize, players: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        hosts,
        players,
    }
}
