//! Server, gateway, and logging settings.

use agora_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Listener and WebSocket transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port for HTTP and WebSocket traffic.
    pub port: u16,
    /// Maximum number of concurrently open sessions.
    pub max_connections: usize,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close the connection when no pong arrives within this many seconds.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8700,
            max_connections: 10_000,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

/// Session gateway and dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Bounded outbound queue length per session.
    pub send_queue_capacity: usize,
    /// Pushes dropped on a full queue before the session is evicted.
    pub max_dropped_messages: u64,
    /// Upper bound on a single action handler, in seconds.
    pub handler_timeout_secs: u64,
    /// Bounded length of the change feed between ingest and dispatch.
    pub feed_capacity: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            send_queue_capacity: 1024,
            max_dropped_messages: 256,
            handler_timeout_secs: 10,
            feed_capacity: 4096,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_server_settings() {
        let s: ServerSettings = serde_json::from_value(json!({"port": 9000})).unwrap();
        assert_eq!(s.port, 9000);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.pong_timeout_secs, 60);
    }

    #[test]
    fn pong_timeout_exceeds_heartbeat() {
        let s = ServerSettings::default();
        assert!(s.pong_timeout_secs > s.heartbeat_interval_secs);
    }

    #[test]
    fn logging_format_from_json() {
        let s: LoggingSettings = serde_json::from_value(json!({"format": "json"})).unwrap();
        assert_eq!(s.format, LogFormat::Json);
        assert_eq!(s.level, "info");
    }
}
