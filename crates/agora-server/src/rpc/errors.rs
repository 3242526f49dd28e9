//! Action error codes and error type.

use agora_pubsub::{RegistryError, RouteError};

// ── Error code constants ────────────────────────────────────────────

/// Requested resource does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Principal may not perform the action.
pub const FORBIDDEN: &str = "FORBIDDEN";
/// Malformed or missing parameters.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
/// No handler registered for the action.
pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
/// Storage is temporarily unavailable; retry later.
pub const TRANSIENT_STORAGE: &str = "TRANSIENT_STORAGE";
/// Handler exceeded its time limit.
pub const TIMEOUT: &str = "TIMEOUT";
/// The session's channel closed mid-action.
pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Error returned by action handlers.
///
/// Every variant maps to an HTTP-style status carried in the reply frame.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Requested resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Principal may not perform the action.
    #[error("{0}")]
    Forbidden(String),
    /// Malformed or missing parameters.
    #[error("{0}")]
    InvalidRequest(String),
    /// No handler registered for the action.
    #[error("action '{0}' is not allowed")]
    MethodNotAllowed(String),
    /// Storage is temporarily unavailable.
    #[error("{0}")]
    TransientStorage(String),
    /// Handler exceeded its time limit.
    #[error("action '{action}' timed out after {secs}s")]
    Timeout {
        /// Action name.
        action: String,
        /// Limit in seconds.
        secs: u64,
    },
    /// The session's channel closed mid-action.
    #[error("channel closed")]
    ChannelClosed,
    /// Unexpected internal error. The message is never sent to clients.
    #[error("{0}")]
    Internal(String),
}

impl ActionError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => NOT_FOUND,
            Self::Forbidden(_) => FORBIDDEN,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotAllowed(_) => METHOD_NOT_ALLOWED,
            Self::TransientStorage(_) => TRANSIENT_STORAGE,
            Self::Timeout { .. } => TIMEOUT,
            Self::ChannelClosed => CHANNEL_CLOSED,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// HTTP-style status for the reply frame.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::InvalidRequest(_) => 400,
            Self::MethodNotAllowed(_) => 405,
            Self::TransientStorage(_) => 503,
            Self::Timeout { .. } => 504,
            Self::ChannelClosed => 410,
            Self::Internal(_) => 500,
        }
    }

    /// Message safe to show a client.
    ///
    /// Internal errors may carry paths or driver output, so they collapse to
    /// a fixed string.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RouteError> for ActionError {
    fn from(err: RouteError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<RegistryError> for ActionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SessionClosed(_) => Self::ChannelClosed,
        }
    }
}
