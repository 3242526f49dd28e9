//! Per-subscriber rendering.
//!
//! The dispatcher calls a [`Renderer`] once per recipient session. The
//! bundled [`SnapshotRenderer`] forwards the event's snapshot, filtered by an
//! [`Authorizer`] that decides what each principal may see.

use std::collections::HashMap;

use agora_core::{ChangeEvent, ChangeKind, Principal, VisibilityRule};
use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::session::SessionHandle;

/// Outcome of rendering one event for one session.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    /// Push this payload as the frame's `data`.
    Deliver(Value),
    /// Skip this session.
    Suppress,
}

/// Rendering failed for one session.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Fields must be removed but the snapshot is not a JSON object.
    #[error("cannot redact non-object snapshot of {entity} {pk}")]
    NotAnObject {
        /// Entity kind.
        entity: String,
        /// Entity id.
        pk: String,
    },
    /// A collaborator failed.
    #[error("{0}")]
    Failed(String),
}

/// Builds the payload a session receives for an event.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `event` for `session`.
    async fn render(&self, event: &ChangeEvent, session: &SessionHandle) -> Result<Rendered, RenderError>;
}

/// What a principal may see of an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Full snapshot.
    Visible,
    /// Snapshot without these fields.
    Redacted(Vec<String>),
    /// Nothing; the session is skipped.
    Hidden,
}

/// Decides per-recipient visibility.
pub trait Authorizer: Send + Sync {
    /// Visibility of `event` for `principal` (`None` for anonymous sessions).
    fn visibility(&self, principal: Option<&Principal>, event: &ChangeEvent) -> Visibility;
}

/// Everyone sees everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn visibility(&self, _principal: Option<&Principal>, _event: &ChangeEvent) -> Visibility {
        Visibility::Visible
    }
}

/// Visibility driven by [`VisibilityRule`]s, one per entity kind.
#[derive(Clone, Debug, Default)]
pub struct PolicyAuthorizer {
    rules: HashMap<String, VisibilityRule>,
}

impl PolicyAuthorizer {
    /// Build from rules. Kinds without a rule are visible to everyone.
    pub fn new(rules: impl IntoIterator<Item = VisibilityRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.entity.clone(), r)).collect(),
        }
    }

    fn is_owner(field: &str, principal: Option<&Principal>, event: &ChangeEvent) -> bool {
        let Some(principal) = principal else {
            return false;
        };
        let Some(owner) = event.snapshot.as_ref().and_then(|s| s.get(field)) else {
            return false;
        };
        match owner {
            // Membership lists: any element naming the principal.
            Value::Array(members) => members.iter().any(|m| Self::is_id(m, &principal.id)),
            other => Self::is_id(other, &principal.id),
        }
    }

    fn is_id(value: &Value, id: &str) -> bool {
        match value {
            Value::String(s) => s == id,
            Value::Number(n) => n.to_string() == id,
            _ => false,
        }
    }
}

impl Authorizer for PolicyAuthorizer {
    fn visibility(&self, principal: Option<&Principal>, event: &ChangeEvent) -> Visibility {
        let Some(rule) = self.rules.get(&event.entity) else {
            return Visibility::Visible;
        };
        if let Some(field) = &rule.owner_field {
            if Self::is_owner(field, principal, event) {
                return Visibility::Visible;
            }
            if rule.redact.is_empty() {
                return Visibility::Hidden;
            }
        } else if rule.redact.is_empty() {
            return Visibility::Visible;
        }
        Visibility::Redacted(rule.redact.clone())
    }
}

/// Forwards the event snapshot, filtered by an [`Authorizer`].
///
/// Deletes carry `{"pk": ..}` only. A create or update without a snapshot
/// also degrades to `{"pk": ..}` so clients can refetch.
#[derive(Clone, Debug, Default)]
pub struct SnapshotRenderer<A> {
    authorizer: A,
}

impl<A: Authorizer> SnapshotRenderer<A> {
    /// Wrap an authorizer.
    pub fn new(authorizer: A) -> Self {
        Self { authorizer }
    }

    /// The wrapped authorizer.
    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    fn payload(event: &ChangeEvent, visibility: Visibility) -> Result<Rendered, RenderError> {
        let snapshot = match (&event.change, &event.snapshot) {
            (ChangeKind::Delete, _) | (_, None) => return Ok(Rendered::Deliver(json!({ "pk": event.pk }))),
            (_, Some(snapshot)) => snapshot,
        };
        match visibility {
            Visibility::Hidden => Ok(Rendered::Suppress),
            Visibility::Visible => Ok(Rendered::Deliver(snapshot.clone())),
            Visibility::Redacted(fields) => {
                let Value::Object(mut map) = snapshot.clone() else {
                    return Err(RenderError::NotAnObject {
                        entity: event.entity.clone(),
                        pk: event.pk.clone(),
                    });
                };
                for field in &fields {
                    let _ = map.remove(field);
                }
                Ok(Rendered::Deliver(Value::Object(map)))
            }
        }
    }
}

#[async_trait]
impl<A: Authorizer> Renderer for SnapshotRenderer<A> {
    async fn render(&self, event: &ChangeEvent, session: &SessionHandle) -> Result<Rendered, RenderError> {
        let visibility = self.authorizer.visibility(session.principal(), event);
        if visibility == Visibility::Hidden {
            return Ok(Rendered::Suppress);
        }
        Self::payload(event, visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::SessionId;
    use agora_core::rules::civic_visibility;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    fn session(principal: Option<&str>) -> SessionHandle {
        let (tx, _rx) = mpsc::channel(1);
        SessionHandle::new(SessionId::new(), principal.map(Principal::new), tx)
    }

    fn notification_for(user: u64) -> ChangeEvent {
        ChangeEvent::created("notification", "1").with_snapshot(json!({"id": 1, "user": user, "text": "hi"}))
    }

    #[tokio::test]
    async fn allow_all_forwards_snapshot() {
        let renderer = SnapshotRenderer::new(AllowAll);
        let event = ChangeEvent::updated("ballot", "12").with_snapshot(json!({"title": "budget"}));
        let rendered = renderer.render(&event, &session(None)).await.unwrap();
        assert_eq!(rendered, Rendered::Deliver(json!({"title": "budget"})));
    }

    #[tokio::test]
    async fn delete_carries_pk_only() {
        let renderer = SnapshotRenderer::new(AllowAll);
        let event = ChangeEvent::deleted("ballot", "12").with_snapshot(json!({"title": "budget"}));
        let rendered = renderer.render(&event, &session(None)).await.unwrap();
        assert_eq!(rendered, Rendered::Deliver(json!({"pk": "12"})));
    }

    #[tokio::test]
    async fn missing_snapshot_degrades_to_pk() {
        let renderer = SnapshotRenderer::new(AllowAll);
        let rendered = renderer
            .render(&ChangeEvent::updated("poll", "3"), &session(None))
            .await
            .unwrap();
        assert_eq!(rendered, Rendered::Deliver(json!({"pk": "3"})));
    }

    #[tokio::test]
    async fn notification_only_reaches_owner() {
        let renderer = SnapshotRenderer::new(PolicyAuthorizer::new(civic_visibility()));
        let event = notification_for(7);
        assert_matches!(
            renderer.render(&event, &session(Some("7"))).await.unwrap(),
            Rendered::Deliver(data) if data["text"] == "hi"
        );
        assert_eq!(
            renderer.render(&event, &session(Some("8"))).await.unwrap(),
            Rendered::Suppress
        );
        assert_eq!(renderer.render(&event, &session(None)).await.unwrap(), Rendered::Suppress);
    }

    #[tokio::test]
    async fn user_fields_redacted_for_others() {
        let renderer = SnapshotRenderer::new(PolicyAuthorizer::new(civic_visibility()));
        let event = ChangeEvent::updated("user", "7")
            .with_snapshot(json!({"id": "7", "name": "ada", "email": "a@x", "phone": "1"}));

        let own = renderer.render(&event, &session(Some("7"))).await.unwrap();
        assert_matches!(own, Rendered::Deliver(data) if data.get("email").is_some());

        let other = renderer.render(&event, &session(Some("8"))).await.unwrap();
        assert_eq!(other, Rendered::Deliver(json!({"id": "7", "name": "ada"})));
    }

    #[tokio::test]
    async fn redacting_scalar_snapshot_fails() {
        let renderer = SnapshotRenderer::new(PolicyAuthorizer::new([VisibilityRule {
            entity: "tally".into(),
            owner_field: None,
            redact: vec!["secret".into()],
        }]));
        let event = ChangeEvent::updated("tally", "1").with_snapshot(json!(42));
        assert_matches!(
            renderer.render(&event, &session(None)).await,
            Err(RenderError::NotAnObject { .. })
        );
    }

    #[tokio::test]
    async fn chat_messages_reach_members_only() {
        let renderer = SnapshotRenderer::new(PolicyAuthorizer::new(civic_visibility()));
        let message = ChangeEvent::created("message", "900")
            .with_group("chat", "42")
            .with_snapshot(json!({"id": 900, "user": 8, "text": "hello", "members": [7, "8"]}));

        for member in ["7", "8"] {
            assert_matches!(
                renderer.render(&message, &session(Some(member))).await.unwrap(),
                Rendered::Deliver(data) if data["text"] == "hello"
            );
        }
        assert_eq!(
            renderer.render(&message, &session(Some("9"))).await.unwrap(),
            Rendered::Suppress
        );
        assert_eq!(renderer.render(&message, &session(None)).await.unwrap(), Rendered::Suppress);

        let chat = ChangeEvent::updated("chat", "42").with_snapshot(json!({"id": 42, "users": [7, 8]}));
        assert_matches!(
            renderer.render(&chat, &session(Some("7"))).await.unwrap(),
            Rendered::Deliver(_)
        );
        assert_eq!(renderer.render(&chat, &session(Some("9"))).await.unwrap(), Rendered::Suppress);
    }

    #[test]
    fn membership_without_list_is_hidden() {
        let policy = PolicyAuthorizer::new(civic_visibility());
        let event = ChangeEvent::created("message", "1").with_snapshot(json!({"members": [[7]], "text": "x"}));
        assert_eq!(
            policy.visibility(Some(&Principal::new("7")), &event),
            Visibility::Hidden
        );
        let event = ChangeEvent::created("message", "1").with_snapshot(json!({"text": "x"}));
        assert_eq!(
            policy.visibility(Some(&Principal::new("7")), &event),
            Visibility::Hidden
        );
    }

    #[test]
    fn unruled_kind_is_visible() {
        let policy = PolicyAuthorizer::new(civic_visibility());
        assert_eq!(
            policy.visibility(None, &ChangeEvent::created("ballot", "1")),
            Visibility::Visible
        );
    }
}
