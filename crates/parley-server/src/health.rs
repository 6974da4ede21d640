//! Liveness endpoints.

use std::time::Instant;

use serde::Serialize;

pub const ROOT_BANNER: &str = "Voice bot is running!";

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server is up.
    pub status: &'static str,
    pub active_calls: usize,
    pub uptime_secs: u64,
}

pub fn health_check(start_time: Instant, active_calls: usize) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        active_calls,
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_counters() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(30))
            .unwrap();
        let resp = health_check(start, 3);
        assert_eq!(resp.status, "healthy");
        assert_eq!(resp.active_calls, 3);
        assert!(resp.uptime_secs >= 29);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_value(health_check(Instant::now(), 0)).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["active_calls"], 0);
        assert!(json["uptime_secs"].is_number());
    }
}
