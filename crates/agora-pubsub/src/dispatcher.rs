//! Change dispatch.
//!
//! One [`ChangeDispatcher::dispatch`] call:
//! 1. resolves the event's topics through the router
//! 2. snapshots subscribers of every topic and groups them by session
//! 3. renders once per session, isolating errors and panics
//! 4. pushes one frame per `(topic, request_id)` pairing to the session's queue
//!
//! A session holding the same request id on two of the event's topics gets
//! two frames, one per topic it subscribed to.
//!
//! Calls are serialized by a fair async lock, so every session observes
//! events in the order `dispatch` was entered.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use agora_core::{ChangeEvent, Frame, RequestId, SessionId};
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::metrics as names;
use crate::registry::SubscriptionRegistry;
use crate::render::{Rendered, Renderer};
use crate::router::TopicRouter;
use crate::session::{PushError, SessionHandle};

/// Counts from one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Topics the event resolved to.
    pub topics: usize,
    /// Distinct sessions reached through those topics.
    pub sessions: usize,
    /// Frames queued, one per `(topic, session, request_id)` pairing.
    pub delivered: usize,
    /// Sessions the renderer suppressed.
    pub suppressed: usize,
    /// Sessions whose render failed or panicked.
    pub failed: usize,
    /// Frames dropped on full or closed queues.
    pub dropped: usize,
    /// Sessions closed for exceeding the drop limit.
    pub evicted: usize,
}

struct Recipient {
    session: Arc<SessionHandle>,
    /// In topic order; a request id repeats once per topic it was reached through.
    request_ids: Vec<RequestId>,
}

/// Fans change events out to subscribed sessions.
pub struct ChangeDispatcher {
    registry: Arc<SubscriptionRegistry>,
    router: Arc<dyn TopicRouter>,
    renderer: Arc<dyn Renderer>,
    max_dropped_messages: u64,
    sequencer: Mutex<()>,
}

impl ChangeDispatcher {
    /// Default slow-consumer threshold.
    pub const DEFAULT_MAX_DROPPED: u64 = 256;

    /// Create a dispatcher.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        router: Arc<dyn TopicRouter>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            registry,
            router,
            renderer,
            max_dropped_messages: Self::DEFAULT_MAX_DROPPED,
            sequencer: Mutex::new(()),
        }
    }

    /// Close sessions once they have dropped this many frames.
    #[must_use]
    pub fn with_max_dropped_messages(mut self, max: u64) -> Self {
        self.max_dropped_messages = max.max(1);
        self
    }

    /// The registry this dispatcher reads.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// The router this dispatcher resolves topics with.
    pub fn router(&self) -> &Arc<dyn TopicRouter> {
        &self.router
    }

    /// Deliver `event` to every subscriber of its topics.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let _turn = self.sequencer.lock().await;
        let start = Instant::now();
        counter!(names::DISPATCH_EVENTS_TOTAL, "entity" => event.entity.clone()).increment(1);

        let topics = self.router.topics_for_event(event);
        let mut report = DispatchReport {
            topics: topics.len(),
            ..DispatchReport::default()
        };

        let mut recipients: BTreeMap<SessionId, Recipient> = BTreeMap::new();
        for topic in &topics {
            for sub in self.registry.subscribers_of(topic) {
                recipients
                    .entry(sub.session.id.clone())
                    .or_insert_with(|| Recipient {
                        session: Arc::clone(&sub.session),
                        request_ids: Vec::new(),
                    })
                    .request_ids
                    .push(sub.request_id);
            }
        }
        report.sessions = recipients.len();

        for recipient in recipients.into_values() {
            self.deliver(event, recipient, &mut report).await;
        }

        counter!(names::DISPATCH_DELIVERIES_TOTAL).increment(report.delivered as u64);
        counter!(names::DISPATCH_SUPPRESSED_TOTAL).increment(report.suppressed as u64);
        counter!(names::DISPATCH_RENDER_FAILURES_TOTAL).increment(report.failed as u64);
        counter!(names::DISPATCH_DROPS_TOTAL).increment(report.dropped as u64);
        histogram!(names::DISPATCH_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        debug!(
            entity = %event.entity,
            pk = %event.pk,
            change = event.change.as_str(),
            topics = report.topics,
            sessions = report.sessions,
            delivered = report.delivered,
            suppressed = report.suppressed,
            failed = report.failed,
            dropped = report.dropped,
            "dispatched change"
        );
        report
    }

    async fn deliver(&self, event: &ChangeEvent, recipient: Recipient, report: &mut DispatchReport) {
        let session = recipient.session;
        if session.is_closed() {
            return;
        }

        let rendered = AssertUnwindSafe(self.renderer.render(event, &session))
            .catch_unwind()
            .await;
        let data = match rendered {
            Ok(Ok(Rendered::Deliver(data))) => data,
            Ok(Ok(Rendered::Suppress)) => {
                report.suppressed += 1;
                return;
            }
            Ok(Err(err)) => {
                report.failed += 1;
                warn!(session_id = %session.id, entity = %event.entity, pk = %event.pk, error = %err, "render failed");
                return;
            }
            Err(panic) => {
                report.failed += 1;
                error!(
                    session_id = %session.id,
                    entity = %event.entity,
                    pk = %event.pk,
                    panic = panic_message(panic.as_ref()),
                    "renderer panicked"
                );
                return;
            }
        };

        for request_id in recipient.request_ids {
            let frame = Frame::push(event, request_id, data.clone());
            match session.push(&frame) {
                Ok(()) => report.delivered += 1,
                Err(PushError::Full) => {
                    report.dropped += 1;
                    if session.drop_count() >= self.max_dropped_messages {
                        self.evict(&session);
                        report.evicted += 1;
                        return;
                    }
                }
                Err(PushError::Closed) => {
                    report.dropped += 1;
                    debug!(session_id = %session.id, "push to closed session");
                    return;
                }
                Err(PushError::Encode(err)) => {
                    report.failed += 1;
                    warn!(session_id = %session.id, error = %err, "failed to encode push");
                    return;
                }
            }
        }
    }

    /// Close a slow consumer and release its subscriptions.
    fn evict(&self, session: &SessionHandle) {
        if !session.close() {
            return;
        }
        let removed = self.registry.unsubscribe_all(&session.id);
        session.release();
        counter!(names::DISPATCH_EVICTIONS_TOTAL).increment(1);
        warn!(
            session_id = %session.id,
            dropped = session.drop_count(),
            subscriptions = removed,
            "evicted slow consumer"
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
