//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;
use serialws_serial::PortPhase;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Serial session phase (`closed`, `opening`, `open`, `closing`).
    pub serial: String,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, serial: PortPhase) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        serial: serial.to_string(),
    }
}
