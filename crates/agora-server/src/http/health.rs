//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server runs.
    pub status: String,
    /// Deployment name from settings.
    pub name: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open sessions.
    pub sessions: usize,
    /// Topics with at least one subscriber.
    pub topics: usize,
    /// `(session, topic, request id)` pairings.
    pub subscriptions: usize,
}

/// Live counters reported by `/health`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCounts {
    /// Open sessions.
    pub sessions: usize,
    /// Topics with at least one subscriber.
    pub topics: usize,
    /// Subscription pairings.
    pub subscriptions: usize,
}

/// Build a health response from live counters.
pub fn health_check(name: &str, start_time: Instant, counts: HealthCounts) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        name: name.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_secs: start_time.elapsed().as_secs(),
        sessions: counts.sessions,
        topics: counts.topics,
        subscriptions: counts.subscriptions,
    }
}
