//! Settings errors.
//!
//! File problems carry the offending path. Validation problems name the
//! camelCase key as it is written in `settings.json`.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file is not JSON.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        /// Settings file.
        path: PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },
    /// The merged document does not fit the settings schema.
    #[error("settings do not match the schema: {0}")]
    Schema(#[from] serde_json::Error),
    /// A limit is below what the gateway can run with.
    #[error("{key} must be at least {min}")]
    BelowMinimum {
        /// Dotted settings key.
        key: &'static str,
        /// Smallest accepted value.
        min: u64,
    },
    /// A route rule has an empty `entity`.
    #[error("route entity must be non-empty")]
    EmptyRouteEntity,
    /// Two route rules name the same entity.
    #[error("duplicate route for entity '{0}'")]
    DuplicateRoute(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/agora/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to read /etc/agora/settings.json: denied");
    }

    #[test]
    fn below_minimum_names_the_key() {
        let err = SettingsError::BelowMinimum {
            key: "gateway.feedCapacity",
            min: 1,
        };
        assert_eq!(err.to_string(), "gateway.feedCapacity must be at least 1");
    }

    #[test]
    fn schema_error_from_conversion() {
        let json_err = serde_json::from_str::<u16>("\"x\"").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(matches!(err, SettingsError::Schema(_)));
    }
}
