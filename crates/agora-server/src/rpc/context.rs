//! Per-action dependency context.

use std::sync::Arc;

use agora_core::RequestId;
use agora_pubsub::{SessionHandle, SubscriptionRegistry, TopicRouter};

/// Everything a handler may touch while serving one action.
pub struct ActionContext {
    /// Session that sent the action.
    pub session: Arc<SessionHandle>,
    /// Correlation id of the inbound frame.
    pub request_id: Option<RequestId>,
    /// Subscription registry shared with the dispatcher.
    pub subscriptions: Arc<SubscriptionRegistry>,
    /// Topic router shared with the dispatcher.
    pub router: Arc<dyn TopicRouter>,
}
