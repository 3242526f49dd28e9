//! Subscription registry.
//!
//! Two indexes under one lock: topic → session → request ids, and
//! session → topics. Keeping both behind a single `RwLock` means a reader
//! never observes one index updated without the other. The lock is never
//! held across an `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use agora_core::{RequestId, SessionId};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::session::SessionHandle;
use crate::topic::Topic;

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The session closed before the subscription could be recorded.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
}

/// One `(session, request_id)` pairing on a topic.
#[derive(Clone, Debug)]
pub struct Subscriber {
    /// Subscribed session.
    pub session: Arc<SessionHandle>,
    /// Request id the subscription was made under.
    pub request_id: RequestId,
}

struct Holder {
    session: Arc<SessionHandle>,
    request_ids: BTreeSet<RequestId>,
}

#[derive(Default)]
struct Indexes {
    by_topic: HashMap<Topic, BTreeMap<SessionId, Holder>>,
    by_session: HashMap<SessionId, BTreeSet<Topic>>,
}

/// Which sessions hold which topics.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<Indexes>,
}

impl SubscriptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `session` on `topic` under `request_id`.
    ///
    /// Idempotent. Returns `true` if the pairing is new. The closed check runs
    /// under the write lock, so a subscribe racing a disconnect either lands
    /// before `unsubscribe_all` (and is removed by it) or fails here.
    pub fn subscribe(
        &self,
        session: &Arc<SessionHandle>,
        topic: &Topic,
        request_id: RequestId,
    ) -> Result<bool, RegistryError> {
        let mut inner = self.inner.write();
        if session.is_closed() {
            return Err(RegistryError::SessionClosed(session.id.clone()));
        }
        let holder = inner
            .by_topic
            .entry(topic.clone())
            .or_default()
            .entry(session.id.clone())
            .or_insert_with(|| Holder {
                session: Arc::clone(session),
                request_ids: BTreeSet::new(),
            });
        let added = holder.request_ids.insert(request_id);
        let _ = inner
            .by_session
            .entry(session.id.clone())
            .or_default()
            .insert(topic.clone());
        if added {
            debug!(session_id = %session.id, topic = %topic, "subscribed");
        }
        Ok(added)
    }

    /// Remove pairings of `session` on `topic`.
    ///
    /// With `request_id` only that pairing goes; without it every pairing of
    /// the session on the topic goes. Returns how many pairings were removed.
    pub fn unsubscribe(&self, session: &SessionId, topic: &Topic, request_id: Option<&RequestId>) -> usize {
        let mut inner = self.inner.write();
        let Some(holders) = inner.by_topic.get_mut(topic) else {
            return 0;
        };
        let Some(holder) = holders.get_mut(session) else {
            return 0;
        };

        let removed = match request_id {
            Some(rid) => usize::from(holder.request_ids.remove(rid)),
            None => std::mem::take(&mut holder.request_ids).len(),
        };

        if holder.request_ids.is_empty() {
            let _ = holders.remove(session);
            if holders.is_empty() {
                let _ = inner.by_topic.remove(topic);
            }
            if let Some(topics) = inner.by_session.get_mut(session) {
                let _ = topics.remove(topic);
                if topics.is_empty() {
                    let _ = inner.by_session.remove(session);
                }
            }
        }
        if removed > 0 {
            debug!(session_id = %session, topic = %topic, removed, "unsubscribed");
        }
        removed
    }

    /// Remove every subscription `session` holds. Returns the pairing count.
    pub fn unsubscribe_all(&self, session: &SessionId) -> usize {
        let mut inner = self.inner.write();
        let Some(topics) = inner.by_session.remove(session) else {
            return 0;
        };
        let mut removed = 0;
        for topic in &topics {
            if let Some(holders) = inner.by_topic.get_mut(topic) {
                if let Some(holder) = holders.remove(session) {
                    removed += holder.request_ids.len();
                }
                if holders.is_empty() {
                    let _ = inner.by_topic.remove(topic);
                }
            }
        }
        debug!(session_id = %session, topics = topics.len(), removed, "released all subscriptions");
        removed
    }

    /// Owned snapshot of the pairings on `topic`.
    pub fn subscribers_of(&self, topic: &Topic) -> Vec<Subscriber> {
        let inner = self.inner.read();
        inner
            .by_topic
            .get(topic)
            .map(|holders| {
                holders
                    .values()
                    .flat_map(|h| {
                        h.request_ids.iter().map(|rid| Subscriber {
                            session: Arc::clone(&h.session),
                            request_id: rid.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Topics `session` holds, each with its request ids.
    pub fn topics_of(&self, session: &SessionId) -> Vec<(Topic, Vec<RequestId>)> {
        let inner = self.inner.read();
        let Some(topics) = inner.by_session.get(session) else {
            return Vec::new();
        };
        topics
            .iter()
            .map(|topic| {
                let request_ids = inner
                    .by_topic
                    .get(topic)
                    .and_then(|holders| holders.get(session))
                    .map(|h| h.request_ids.iter().cloned().collect())
                    .unwrap_or_default();
                (topic.clone(), request_ids)
            })
            .collect()
    }

    /// Topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.read().by_topic.len()
    }

    /// Total `(session, topic, request_id)` pairings.
    pub fn subscription_count(&self) -> usize {
        self.inner
            .read()
            .by_topic
            .values()
            .flat_map(BTreeMap::values)
            .map(|h| h.request_ids.len())
            .sum()
    }

    /// Sessions holding at least one subscription.
    pub fn session_count(&self) -> usize {
        self.inner.read().by_session.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    fn session(id: &str) -> Arc<SessionHandle> {
        let (tx, _rx) = mpsc::channel(8);
        Arc::new(SessionHandle::new(SessionId::from(id), None, tx))
    }

    fn rid(n: u64) -> RequestId {
        RequestId::from(n)
    }

    #[test]
    fn subscribe_is_idempotent() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let t = Topic::instance("ballot", "1");
        assert!(reg.subscribe(&s, &t, rid(1)).unwrap());
        assert!(!reg.subscribe(&s, &t, rid(1)).unwrap());
        assert_eq!(reg.subscribers_of(&t).len(), 1);
        assert_eq!(reg.subscription_count(), 1);
    }

    #[test]
    fn request_ids_are_independent() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let t = Topic::all("poll");
        let _ = reg.subscribe(&s, &t, rid(1)).unwrap();
        let _ = reg.subscribe(&s, &t, rid(2)).unwrap();
        assert_eq!(reg.unsubscribe(&s.id, &t, Some(&rid(1))), 1);
        let left = reg.subscribers_of(&t);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].request_id, rid(2));
    }

    #[test]
    fn unsubscribe_without_request_id_removes_all_pairings() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let t = Topic::all("poll");
        let _ = reg.subscribe(&s, &t, rid(1)).unwrap();
        let _ = reg.subscribe(&s, &t, rid(2)).unwrap();
        assert_eq!(reg.unsubscribe(&s.id, &t, None), 2);
        assert!(reg.subscribers_of(&t).is_empty());
        assert_eq!(reg.topic_count(), 0);
        assert_eq!(reg.session_count(), 0);
    }

    #[test]
    fn unsubscribe_absent_is_noop() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        assert_eq!(reg.unsubscribe(&s.id, &Topic::all("x"), None), 0);
        let _ = reg.subscribe(&s, &Topic::all("x"), rid(1)).unwrap();
        assert_eq!(reg.unsubscribe(&s.id, &Topic::all("x"), Some(&rid(9))), 0);
        assert_eq!(reg.subscription_count(), 1);
    }

    #[test]
    fn unsubscribe_all_prunes_both_indexes() {
        let reg = SubscriptionRegistry::new();
        let a = session("a");
        let b = session("b");
        let t1 = Topic::instance("chat", "1");
        let t2 = Topic::instance("chat", "2");
        let _ = reg.subscribe(&a, &t1, rid(1)).unwrap();
        let _ = reg.subscribe(&a, &t2, rid(2)).unwrap();
        let _ = reg.subscribe(&b, &t1, rid(1)).unwrap();

        assert_eq!(reg.unsubscribe_all(&a.id), 2);
        assert!(reg.topics_of(&a.id).is_empty());
        assert_eq!(reg.topic_count(), 1);
        let left = reg.subscribers_of(&t1);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].session.id, b.id);
        assert_eq!(reg.unsubscribe_all(&a.id), 0);
    }

    #[test]
    fn closed_session_cannot_subscribe() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let _ = s.close();
        assert_matches!(
            reg.subscribe(&s, &Topic::all("ballot"), rid(1)),
            Err(RegistryError::SessionClosed(id)) if id == s.id
        );
        assert_eq!(reg.topic_count(), 0);
    }

    #[test]
    fn topics_of_lists_request_ids() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let _ = reg.subscribe(&s, &Topic::all("ballot"), rid(2)).unwrap();
        let _ = reg.subscribe(&s, &Topic::all("ballot"), rid(1)).unwrap();
        let _ = reg.subscribe(&s, &Topic::instance("poll", "3"), rid(5)).unwrap();
        let topics = reg.topics_of(&s.id);
        assert_eq!(topics.len(), 2);
        let (topic, rids) = &topics[0];
        assert_eq!(topic.as_str(), "ballot");
        assert_eq!(rids, &vec![rid(1), rid(2)]);
    }

    #[test]
    fn snapshot_survives_later_mutation() {
        let reg = SubscriptionRegistry::new();
        let s = session("a");
        let t = Topic::all("post");
        let _ = reg.subscribe(&s, &t, rid(1)).unwrap();
        let snapshot = reg.subscribers_of(&t);
        let _ = reg.unsubscribe_all(&s.id);
        assert_eq!(snapshot.len(), 1);
        assert!(reg.subscribers_of(&t).is_empty());
    }
}
