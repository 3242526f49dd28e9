//! Server configuration.

use std::time::Duration;

use agora_settings::AgoraSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`crate::server::AgoraServer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// Maximum concurrently open sessions.
    pub max_connections: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client silent for this many seconds.
    pub pong_timeout_secs: u64,
    /// Outbound queue depth per session.
    pub send_queue_capacity: usize,
    /// Consecutive drops before a session is evicted.
    pub max_dropped_messages: u64,
    /// Time limit for a single action handler.
    pub handler_timeout_secs: u64,
    /// Change feed depth.
    pub feed_capacity: usize,
    /// Reject WebSocket clients without a principal.
    pub require_auth: bool,
    /// Bearer token required on `POST /events`.
    pub ingest_token: Option<String>,
}

impl ServerConfig {
    /// Derive the runtime config from loaded settings.
    pub fn from_settings(settings: &AgoraSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            max_message_size: settings.server.max_message_size,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            pong_timeout_secs: settings.server.pong_timeout_secs,
            send_queue_capacity: settings.gateway.send_queue_capacity,
            max_dropped_messages: settings.gateway.max_dropped_messages,
            handler_timeout_secs: settings.gateway.handler_timeout_secs,
            feed_capacity: settings.gateway.feed_capacity,
            require_auth: true,
            ingest_token: settings.auth.ingest_token.clone(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence allowed before disconnect.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }

    /// Handler time limit.
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 10_000,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 60,
            send_queue_capacity: 1024,
            max_dropped_messages: 256,
            handler_timeout_secs: 10,
            feed_capacity: 4096,
            require_auth: true,
            ingest_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
        assert!(cfg.require_auth);
        assert!(cfg.ingest_token.is_none());
    }

    #[test]
    fn from_settings_copies_every_section() {
        let mut settings = AgoraSettings::default();
        settings.server.port = 9100;
        settings.server.pong_timeout_secs = 15;
        settings.gateway.send_queue_capacity = 8;
        settings.gateway.handler_timeout_secs = 3;
        settings.auth.ingest_token = Some("secret".into());

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.send_queue_capacity, 8);
        assert_eq!(cfg.handler_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.ingest_token.as_deref(), Some("secret"));
        assert_eq!(cfg.host, settings.server.host);
    }

    #[test]
    fn durations_never_zero() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            pong_timeout_secs: 0,
            handler_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.handler_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig {
            ingest_token: Some("t".into()),
            ..ServerConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ingest_token, cfg.ingest_token);
        assert_eq!(back.max_message_size, cfg.max_message_size);
    }
}
