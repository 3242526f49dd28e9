//! # agora-settings
//!
//! Configuration for the Agora gateway, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`AgoraSettings::default()`]
//! 2. **Settings file**: `~/.agora/settings.json` or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment variables**: `AGORA_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = AgoraSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = AgoraSettings::default();
        assert_eq!(settings.name, "agora");
        assert_eq!(settings.server.port, 8700);
        assert_eq!(settings.gateway.send_queue_capacity, 1024);
        assert!(settings.auth.tokens.is_empty());
        assert!(!settings.routes.is_empty());
        assert!(settings.validate().is_ok());
    }
}
