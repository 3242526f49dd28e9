//! Topic routing.
//!
//! [`RouteTable`] interprets [`RouteRule`]s in both directions: which topics
//! a change is published to, and which topic a subscribe request names. Both
//! directions read the same rule, so a subscriber and the matching event
//! always meet on the same key.

use std::collections::HashMap;

use agora_core::ids::opt_string_or_number;
use agora_core::rules::civic_routes;
use agora_core::{ChangeEvent, GroupKey, RouteRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topic::{Topic, TopicSet};

/// Why a subscribe request names no topic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// `kind` was empty.
    #[error("kind is required")]
    MissingKind,
    /// Both `pk` and `group` were given.
    #[error("pk and group are mutually exclusive")]
    Ambiguous,
    /// The kind does not publish per-instance topics.
    #[error("'{kind}' has no per-instance stream")]
    NoInstanceStream {
        /// Entity kind.
        kind: String,
    },
    /// The kind does not publish an `all` topic.
    #[error("'{kind}' has no collection stream; pass pk or group")]
    NoCollectionStream {
        /// Entity kind.
        kind: String,
    },
    /// The kind does not group by this field.
    #[error("'{kind}' is not grouped by '{field}'")]
    UnknownGroup {
        /// Entity kind.
        kind: String,
        /// Requested group field.
        field: String,
    },
}

/// Parameters of a `subscribe` / `unsubscribe` action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Entity kind.
    pub kind: String,
    /// Instance primary key (string or integer on the wire).
    #[serde(default, deserialize_with = "opt_string_or_number", skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    /// Group selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupKey>,
}

impl SubscribeRequest {
    /// Every change of `kind`.
    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// One instance.
    pub fn instance(kind: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            pk: Some(pk.into()),
            group: None,
        }
    }

    /// One group value.
    pub fn group(kind: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            pk: None,
            group: Some(GroupKey {
                field: field.into(),
                value: value.into(),
            }),
        }
    }
}

/// Maps events and subscribe requests onto topics.
pub trait TopicRouter: Send + Sync {
    /// Topics an event is published to. Pure; no I/O.
    fn topics_for_event(&self, event: &ChangeEvent) -> TopicSet;

    /// Topics a subscribe request names.
    fn topics_for_subscription(&self, request: &SubscribeRequest) -> Result<TopicSet, RouteError>;
}

/// Rule-driven router.
#[derive(Clone, Debug)]
pub struct RouteTable {
    rules: HashMap<String, RouteRule>,
}

impl RouteTable {
    /// Build from rules. A later rule for the same entity replaces an earlier one.
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.entity.clone(), r)).collect(),
        }
    }

    /// The civic platform's default table.
    pub fn civic() -> Self {
        Self::new(civic_routes())
    }

    /// Rule for `kind`, if one is declared.
    pub fn rule(&self, kind: &str) -> Option<&RouteRule> {
        self.rules.get(kind)
    }

    /// Number of declared rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are declared.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn with_rule<T>(&self, kind: &str, f: impl FnOnce(&RouteRule) -> T) -> T {
        match self.rules.get(kind) {
            Some(rule) => f(rule),
            // Undeclared kinds get instance + all topics.
            None => f(&RouteRule::new(kind)),
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::civic()
    }
}

impl TopicRouter for RouteTable {
    fn topics_for_event(&self, event: &ChangeEvent) -> TopicSet {
        self.with_rule(&event.entity, |rule| {
            let kind = event.entity.as_str();
            let mut topics = TopicSet::new();
            if rule.instance {
                let _ = topics.insert(Topic::instance(kind, &event.pk));
            }
            if rule.all {
                let _ = topics.insert(Topic::all(kind));
            }
            for field in &rule.groups {
                for value in event.group_values(field) {
                    let _ = topics.insert(Topic::group(kind, field, value));
                }
            }
            for parent in &rule.parents {
                for value in event.group_values(&parent.field) {
                    let _ = topics.insert(Topic::instance(&parent.entity, value));
                    if parent.include_all {
                        let _ = topics.insert(Topic::all(&parent.entity));
                    }
                }
            }
            topics
        })
    }

    fn topics_for_subscription(&self, request: &SubscribeRequest) -> Result<TopicSet, RouteError> {
        let kind = request.kind.as_str();
        if kind.is_empty() {
            return Err(RouteError::MissingKind);
        }
        self.with_rule(kind, |rule| {
            let topic = match (&request.pk, &request.group) {
                (Some(_), Some(_)) => return Err(RouteError::Ambiguous),
                (Some(pk), None) => {
                    if !rule.instance {
                        return Err(RouteError::NoInstanceStream { kind: kind.to_owned() });
                    }
                    Topic::instance(kind, pk)
                }
                (None, Some(group)) => {
                    if !rule.groups.iter().any(|f| *f == group.field) {
                        return Err(RouteError::UnknownGroup {
                            kind: kind.to_owned(),
                            field: group.field.clone(),
                        });
                    }
                    Topic::group(kind, &group.field, &group.value)
                }
                (None, None) => {
                    if !rule.all {
                        return Err(RouteError::NoCollectionStream { kind: kind.to_owned() });
                    }
                    Topic::all(kind)
                }
            };
            Ok(std::iter::once(topic).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn keys(set: &TopicSet) -> Vec<&str> {
        set.iter().map(Topic::as_str).collect()
    }

    #[test]
    fn ballot_publishes_instance_and_all() {
        let table = RouteTable::civic();
        let topics = table.topics_for_event(&ChangeEvent::updated("ballot", "12"));
        assert_eq!(keys(&topics), ["ballot__12", "ballot"]);
    }

    #[test]
    fn message_fans_into_chat() {
        let table = RouteTable::civic();
        let event = ChangeEvent::created("message", "900").with_group("chat", "42");
        assert_eq!(keys(&table.topics_for_event(&event)), ["chat__42"]);
    }

    #[test]
    fn poll_option_fans_into_poll_instance_only() {
        let table = RouteTable::civic();
        let event = ChangeEvent::updated("poll_option", "5").with_group("poll", "3");
        assert_eq!(keys(&table.topics_for_event(&event)), ["poll__3"]);
    }

    #[test]
    fn ballot_option_fans_into_ballot_and_all() {
        let table = RouteTable::civic();
        let event = ChangeEvent::updated("ballot_option", "8").with_group("ballot", "12");
        assert_eq!(keys(&table.topics_for_event(&event)), ["ballot__12", "ballot"]);
    }

    #[test]
    fn post_publishes_each_hashtag() {
        let table = RouteTable::civic();
        let event = ChangeEvent::created("post", "1")
            .with_group("hashtag", "rust")
            .with_group("hashtag", "civic")
            .with_group("hashtag", "rust");
        assert_eq!(
            keys(&table.topics_for_event(&event)),
            ["post__1", "post", "post__hashtag__rust", "post__hashtag__civic"]
        );
    }

    #[test]
    fn unknown_kind_falls_back_to_instance_and_all() {
        let table = RouteTable::civic();
        let topics = table.topics_for_event(&ChangeEvent::deleted("comment", "4"));
        assert_eq!(keys(&topics), ["comment__4", "comment"]);
    }

    #[test]
    fn subscription_matches_event_side() {
        let table = RouteTable::civic();
        let event = ChangeEvent::created("post", "1").with_group("hashtag", "rust");
        let published = table.topics_for_event(&event);
        for request in [
            SubscribeRequest::instance("post", "1"),
            SubscribeRequest::all("post"),
            SubscribeRequest::group("post", "hashtag", "rust"),
        ] {
            let topics = table.topics_for_subscription(&request).unwrap();
            for topic in &topics {
                assert!(published.contains(topic), "{topic} not published");
            }
        }
    }

    #[test]
    fn separator_in_pk_does_not_reach_group_topic() {
        let table = RouteTable::civic();
        let by_pk = table
            .topics_for_subscription(&SubscribeRequest::instance("post", "hashtag__rust"))
            .unwrap();
        let event = ChangeEvent::created("post", "1").with_group("hashtag", "rust");
        let published = table.topics_for_event(&event);
        for topic in &by_pk {
            assert!(!published.contains(topic), "{topic} leaked into a group stream");
        }
    }

    #[test]
    fn subscription_errors() {
        let table = RouteTable::civic();
        assert_matches!(
            table.topics_for_subscription(&SubscribeRequest::all("")),
            Err(RouteError::MissingKind)
        );
        assert_matches!(
            table.topics_for_subscription(&SubscribeRequest::all("chat")),
            Err(RouteError::NoCollectionStream { .. })
        );
        assert_matches!(
            table.topics_for_subscription(&SubscribeRequest::instance("notification", "1")),
            Err(RouteError::NoInstanceStream { .. })
        );
        assert_matches!(
            table.topics_for_subscription(&SubscribeRequest::group("post", "author", "7")),
            Err(RouteError::UnknownGroup { .. })
        );
        let both = SubscribeRequest {
            group: Some(GroupKey {
                field: "hashtag".into(),
                value: "x".into(),
            }),
            ..SubscribeRequest::instance("post", "1")
        };
        assert_matches!(table.topics_for_subscription(&both), Err(RouteError::Ambiguous));
    }

    #[test]
    fn request_accepts_numeric_pk() {
        let request: SubscribeRequest = serde_json::from_value(json!({"kind": "poll", "pk": 3})).unwrap();
        assert_eq!(request, SubscribeRequest::instance("poll", "3"));
    }

    #[test]
    fn request_parses_group() {
        let request: SubscribeRequest = serde_json::from_value(json!({
            "kind": "post",
            "group": {"field": "hashtag", "value": "rust"}
        }))
        .unwrap();
        assert_eq!(request, SubscribeRequest::group("post", "hashtag", "rust"));
    }

    #[test]
    fn later_rule_replaces_earlier() {
        let table = RouteTable::new([RouteRule::new("ballot"), RouteRule::new("ballot").without_all()]);
        assert_eq!(table.len(), 1);
        assert!(!table.rule("ballot").unwrap().all);
    }
}
