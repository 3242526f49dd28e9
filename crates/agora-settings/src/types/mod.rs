//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields take their compiled default.

mod auth;
mod server;

pub use auth::*;
pub use server::*;

use agora_core::rules::{RouteRule, VisibilityRule, civic_routes, civic_visibility};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Agora gateway.
///
/// Example:
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "auth": { "tokens": { "k1": { "id": "7", "name": "ada" } } }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgoraSettings {
    /// Settings schema version.
    pub version: String,
    /// Instance name, reported by `/health`.
    pub name: String,
    /// Listener and WebSocket transport settings.
    pub server: ServerSettings,
    /// Session gateway and dispatch settings.
    pub gateway: GatewaySettings,
    /// Connection and ingest credentials.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Change-to-topic routing rules. Replaced wholesale when set in the file.
    pub routes: Vec<RouteRule>,
    /// Per-recipient visibility rules.
    pub visibility: Vec<VisibilityRule>,
}

impl Default for AgoraSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "agora".to_string(),
            server: ServerSettings::default(),
            gateway: GatewaySettings::default(),
            auth: AuthSettings::default(),
            logging: LoggingSettings::default(),
            routes: civic_routes(),
            visibility: civic_visibility(),
        }
    }
}

impl AgoraSettings {
    /// Reject values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        let minimums: [(&'static str, u64, u64); 5] = [
            ("server.port", u64::from(self.server.port), 1),
            ("server.maxConnections", self.server.max_connections as u64, 1),
            ("gateway.sendQueueCapacity", self.gateway.send_queue_capacity as u64, 1),
            ("gateway.feedCapacity", self.gateway.feed_capacity as u64, 1),
            ("gateway.handlerTimeoutSecs", self.gateway.handler_timeout_secs, 1),
        ];
        for (key, value, min) in minimums {
            if value < min {
                return Err(SettingsError::BelowMinimum { key, min });
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.routes {
            if rule.entity.is_empty() {
                return Err(SettingsError::EmptyRouteEntity);
            }
            if !seen.insert(rule.entity.as_str()) {
                return Err(SettingsError::DuplicateRoute(rule.entity.clone()));
            }
        }
        Ok(())
    }
}
