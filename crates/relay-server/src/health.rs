//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the hub runs, `"stopped"` once it has exited.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Connections currently registered with the hub.
    pub connections: usize,
}

/// Build a health response from the hub's registered connection count.
///
/// `connections` is `None` when the hub could not answer.
pub fn health_check(start_time: Instant, connections: Option<usize>) -> HealthResponse {
    HealthResponse {
        status: if connections.is_some() { "ok" } else { "stopped" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: connections.unwrap_or(0),
    }
}

impl HealthResponse {
    /// Whether the server can still relay messages.
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), Some(0));
        assert_eq!(resp.status, "ok");
        assert!(resp.is_healthy());
    }

    #[test]
    fn stopped_hub_reports_stopped() {
        let resp = health_check(Instant::now(), None);
        assert_eq!(resp.status, "stopped");
        assert_eq!(resp.connections, 0);
        assert!(!resp.is_healthy());
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, Some(0));
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), Some(2));
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 2);
        assert!(parsed["uptime_secs"].is_number());
    }
}
