//! Routing and visibility rules.
//!
//! These are plain data so they can live in the settings file (camelCase
//! keys, like the rest of it). The router and the renderer in `agora-pubsub`
//! interpret them.

use serde::{Deserialize, Serialize};

fn enabled() -> bool {
    true
}

/// Fan-in from a child entity into its parent's stream.
///
/// A `message` with group key `chat = 42` and `ParentRoute { field: "chat",
/// entity: "chat" }` is published to the `chat__42` topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRoute {
    /// Group field on the child event that holds the parent's key.
    pub field: String,
    /// Parent entity kind.
    pub entity: String,
    /// Also publish to the parent's `all` topic.
    #[serde(default)]
    pub include_all: bool,
}

/// How events of one entity kind map onto topics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Entity kind this rule applies to.
    pub entity: String,
    /// Publish to `<entity>__<pk>`.
    #[serde(default = "enabled")]
    pub instance: bool,
    /// Publish to `<entity>` (every change of the kind).
    #[serde(default = "enabled")]
    pub all: bool,
    /// Group fields published as `<entity>__<field>__<value>`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Parent streams this entity fans into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentRoute>,
}

impl RouteRule {
    /// Rule publishing instance and `all` topics, nothing else.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            instance: true,
            all: true,
            groups: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Rule for a child entity that only publishes into parent streams.
    pub fn child(entity: impl Into<String>) -> Self {
        Self {
            instance: false,
            all: false,
            ..Self::new(entity)
        }
    }

    /// Disable the `all` topic.
    #[must_use]
    pub fn without_all(mut self) -> Self {
        self.all = false;
        self
    }

    /// Disable the instance topic.
    #[must_use]
    pub fn without_instance(mut self) -> Self {
        self.instance = false;
        self
    }

    /// Add a group field.
    #[must_use]
    pub fn group(mut self, field: impl Into<String>) -> Self {
        self.groups.push(field.into());
        self
    }

    /// Add a parent route.
    #[must_use]
    pub fn parent(mut self, field: impl Into<String>, entity: impl Into<String>, include_all: bool) -> Self {
        self.parents.push(ParentRoute {
            field: field.into(),
            entity: entity.into(),
            include_all,
        });
        self
    }
}

/// Per-recipient visibility of one entity kind.
///
/// With `owner_field` set, the owner is the principal whose id equals that
/// snapshot field, or appears in it when the field is an array of ids. Non-owners are hidden when `redact` is empty, or see
/// the snapshot minus `redact` fields otherwise. Without `owner_field`,
/// `redact` applies to everyone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRule {
    /// Entity kind.
    pub entity: String,
    /// Snapshot field holding the owning principal id or member ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_field: Option<String>,
    /// Snapshot fields stripped for non-owners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redact: Vec<String>,
}

/// Route table for the civic platform's watched entities.
pub fn civic_routes() -> Vec<RouteRule> {
    vec![
        RouteRule::new("ballot"),
        RouteRule::child("ballot_option").parent("ballot", "ballot", true),
        RouteRule::child("ballot_reason").parent("ballot", "ballot", false),
        RouteRule::new("poll"),
        RouteRule::child("poll_option").parent("poll", "poll", false),
        RouteRule::new("chat").without_all(),
        RouteRule::child("message").parent("chat", "chat", false),
        RouteRule::new("post").group("hashtag"),
        RouteRule::new("survey"),
        RouteRule::child("survey_question").parent("survey", "survey", true),
        RouteRule::child("survey_choice").parent("survey", "survey", true),
        RouteRule::new("petition"),
        RouteRule::new("notification").without_instance(),
        RouteRule::new("user").without_all(),
    ]
}

/// Visibility rules for the civic platform.
pub fn civic_visibility() -> Vec<VisibilityRule> {
    vec![
        VisibilityRule {
            entity: "notification".into(),
            owner_field: Some("user".into()),
            redact: Vec::new(),
        },
        VisibilityRule {
            entity: "chat".into(),
            owner_field: Some("users".into()),
            redact: Vec::new(),
        },
        // Storage attaches the parent chat's member ids to each message.
        VisibilityRule {
            entity: "message".into(),
            owner_field: Some("members".into()),
            redact: Vec::new(),
        },
        VisibilityRule {
            entity: "user".into(),
            owner_field: Some("id".into()),
            redact: vec!["email".into(), "phone".into()],
        },
    ]
}
