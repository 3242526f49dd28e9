//! Authenticated identity attached to a session.

use serde::{Deserialize, Serialize};

/// An authenticated user, as resolved by the external auth collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user id (the storage layer's primary key, as a string).
    pub id: String,
    /// Display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    /// Create a principal with just an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_omitted_when_absent() {
        let json = serde_json::to_value(Principal::new("7")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "7"}));
    }

    #[test]
    fn with_name() {
        let p = Principal::new("7").with_name("ada");
        assert_eq!(p.name.as_deref(), Some("ada"));
    }
}
