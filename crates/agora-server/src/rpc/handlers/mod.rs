//! Built-in action handlers and registration.

pub mod subscription;
pub mod system;

use crate::rpc::registry::ActionRegistry;

/// Register the built-in actions (`subscribe`, `unsubscribe`,
/// `subscriptions`, `ping`).
pub fn register_builtin(registry: &mut ActionRegistry) {
    registry.register("subscribe", subscription::SubscribeHandler);
    registry.register("unsubscribe", subscription::UnsubscribeHandler);
    registry.register("subscriptions", subscription::ListSubscriptionsHandler);
    registry.register("ping", system::PingHandler);
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use agora_core::{Principal, RequestId, SessionId};
    use agora_pubsub::{RouteTable, SessionHandle, SubscriptionRegistry};
    use tokio::sync::mpsc;

    use crate::rpc::context::ActionContext;

    /// Context for a fresh session with request id `1`.
    pub fn make_test_context() -> (ActionContext, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let session = Arc::new(SessionHandle::new(SessionId::new(), Some(Principal::new("7")), tx));
        let ctx = ActionContext {
            session,
            request_id: Some(RequestId::from(1)),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            router: Arc::new(RouteTable::civic()),
        };
        (ctx, rx)
    }
}
