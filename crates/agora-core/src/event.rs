//! Change events emitted by the storage layer after a watched row changes.
//!
//! An event carries everything topic routing needs (entity kind, primary key,
//! parent/group keys) so that no storage lookup is required to fan it out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::string_or_number;

/// What happened to the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Row inserted.
    Create,
    /// Row updated (including many-to-many membership changes).
    Update,
    /// Row deleted.
    Delete,
}

impl ChangeKind {
    /// Wire name (`create` / `update` / `delete`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Status code pushed alongside the change: 201, 200 or 204.
    pub fn status(self) -> u16 {
        match self {
            Self::Create => 201,
            Self::Update => 200,
            Self::Delete => 204,
        }
    }
}

/// A named grouping value carried by an event, e.g. `chat = 42` on a message
/// or `hashtag = rust` on a post. A field may appear more than once.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Field name on the entity.
    pub field: String,
    /// Field value, normalized to a string.
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// Notification of a create/update/delete on a watched entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Entity kind, e.g. `ballot`, `message`, `poll_option`.
    pub entity: String,
    /// Primary key of the changed row.
    #[serde(deserialize_with = "string_or_number")]
    pub pk: String,
    /// Change kind.
    pub change: ChangeKind,
    /// Parent and grouping keys resolvable without further queries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupKey>,
    /// Serialized snapshot of the row after the change (absent on most deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
}

impl ChangeEvent {
    /// Create an event without groups or snapshot.
    pub fn new(entity: impl Into<String>, pk: impl Into<String>, change: ChangeKind) -> Self {
        Self {
            entity: entity.into(),
            pk: pk.into(),
            change,
            groups: Vec::new(),
            snapshot: None,
        }
    }

    /// Shorthand for a `create` event.
    pub fn created(entity: impl Into<String>, pk: impl Into<String>) -> Self {
        Self::new(entity, pk, ChangeKind::Create)
    }

    /// Shorthand for an `update` event.
    pub fn updated(entity: impl Into<String>, pk: impl Into<String>) -> Self {
        Self::new(entity, pk, ChangeKind::Update)
    }

    /// Shorthand for a `delete` event.
    pub fn deleted(entity: impl Into<String>, pk: impl Into<String>) -> Self {
        Self::new(entity, pk, ChangeKind::Delete)
    }

    /// Attach a group key.
    #[must_use]
    pub fn with_group(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.groups.push(GroupKey {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Attach the row snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Value) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// All values recorded for `field`, in insertion order.
    pub fn group_values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.field == field)
            .map(|g| g.value.as_str())
    }
}
