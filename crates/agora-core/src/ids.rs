//! Identifier newtypes.
//!
//! [`SessionId`] is server-generated (UUID v7, time-ordered). [`RequestId`] is
//! chosen by the client to correlate replies and pushes with the UI context
//! that asked for them; clients send it either as a JSON string or an integer,
//! and it is normalized to a string on the way in.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identifier of one connected client session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Client-supplied correlation id attached to actions and subscriptions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Deserialize a key that may arrive as a JSON string or integer.
pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Text(s) => s,
        StringOrNumber::Signed(n) => n.to_string(),
        StringOrNumber::Unsigned(n) => n.to_string(),
    })
}

/// Optional variant of [`string_or_number`], for `#[serde(default)]` fields.
pub fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(
        match Option::<StringOrNumber>::deserialize(deserializer)? {
            None => None,
            Some(StringOrNumber::Text(s)) => Some(s),
            Some(StringOrNumber::Signed(n)) => Some(n.to_string()),
            Some(StringOrNumber::Unsigned(n)) => Some(n.to_string()),
        },
    )
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn session_ids_are_time_ordered() {
        let a = SessionId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = SessionId::new();
        assert!(a < b);
    }

    #[test]
    fn session_id_serializes_transparently() {
        let id = SessionId::from("sess_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sess_1\"");
    }

    #[test]
    fn request_id_from_string() {
        let id: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn request_id_from_integer() {
        let id: RequestId = serde_json::from_str("42").unwrap();
        assert_eq!(id, RequestId::from(42));
    }

    #[test]
    fn request_id_from_negative_integer() {
        let id: RequestId = serde_json::from_str("-7").unwrap();
        assert_eq!(id.as_str(), "-7");
    }

    #[test]
    fn request_id_rejects_objects() {
        assert!(serde_json::from_str::<RequestId>("{}").is_err());
    }

    #[test]
    fn request_id_serializes_as_string() {
        let id = RequestId::from(9);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"9\"");
    }
}
