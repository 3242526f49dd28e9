//! Action registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agora_core::{Frame, InboundFrame};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::metrics::{ACTION_DURATION_SECONDS, ACTION_ERRORS_TOTAL, ACTION_REQUESTS_TOTAL};
use crate::rpc::context::ActionContext;
use crate::rpc::errors::ActionError;

/// Successful handler result.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionReply {
    /// Reply payload.
    pub data: Value,
    /// HTTP-style status.
    pub status: u16,
}

impl ActionReply {
    /// 200 reply.
    pub fn ok(data: Value) -> Self {
        Self { data, status: 200 }
    }

    /// 201 reply.
    pub fn created(data: Value) -> Self {
        Self { data, status: 201 }
    }
}

/// Trait implemented by every action handler.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the handler with the frame's params.
    async fn handle(&self, params: Value, ctx: &ActionContext) -> Result<ActionReply, ActionError>;
}

/// Registry mapping action names to handlers.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    timeout: Duration,
}

impl ActionRegistry {
    /// Default limit for a single handler.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-handler time limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a handler. A later registration replaces an earlier one.
    pub fn register(&mut self, action: &str, handler: impl ActionHandler + 'static) {
        let _ = self.handlers.insert(action.to_owned(), Arc::new(handler));
    }

    /// Dispatch a frame and build the correlated reply frame.
    pub async fn dispatch(&self, frame: InboundFrame, ctx: &ActionContext) -> Frame {
        let InboundFrame {
            action,
            request_id,
            params,
        } = frame;
        counter!(ACTION_REQUESTS_TOTAL, "action" => action.clone()).increment(1);

        let start = Instant::now();
        let result = match self.handlers.get(&action) {
            None => Err(ActionError::MethodNotAllowed(action.clone())),
            Some(handler) => {
                match tokio::time::timeout(self.timeout, handler.handle(Value::Object(params), ctx)).await {
                    Ok(result) => result,
                    Err(_elapsed) => Err(ActionError::Timeout {
                        action: action.clone(),
                        secs: self.timeout.as_secs(),
                    }),
                }
            }
        };
        let duration = start.elapsed();
        histogram!(ACTION_DURATION_SECONDS, "action" => action.clone()).record(duration.as_secs_f64());

        match result {
            Ok(reply) => {
                debug!(action, request_id = ?request_id, status = reply.status, "action ok");
                Frame::reply(action, request_id, reply.data, reply.status)
            }
            Err(err) => {
                counter!(ACTION_ERRORS_TOTAL, "action" => action.clone(), "error_type" => err.code()).increment(1);
                match &err {
                    ActionError::Internal(detail) => {
                        error!(action, request_id = ?request_id, detail, "action failed");
                    }
                    ActionError::Timeout { .. } => {
                        warn!(action, request_id = ?request_id, "action timed out");
                    }
                    _ => debug!(action, request_id = ?request_id, code = err.code(), "action rejected"),
                }
                Frame::error(action, request_id, err.client_message(), err.status())
            }
        }
    }

    /// Registered action names (sorted).
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether an action is registered.
    pub fn has_action(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Per-handler time limit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::make_test_context;
    use agora_core::RequestId;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ActionHandler for EchoHandler {
        async fn handle(&self, params: Value, _ctx: &ActionContext) -> Result<ActionReply, ActionError> {
            Ok(ActionReply::ok(params))
        }
    }

    struct FailHandler;

    #[async_trait]
    impl ActionHandler for FailHandler {
        async fn handle(&self, _params: Value, _ctx: &ActionContext) -> Result<ActionReply, ActionError> {
            Err(ActionError::Internal("db at /var/lib/x exploded".into()))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl ActionHandler for SlowHandler {
        async fn handle(&self, _params: Value, _ctx: &ActionContext) -> Result<ActionReply, ActionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ActionReply::ok(json!(null)))
        }
    }

    fn frame(action: &str, params: Value) -> InboundFrame {
        InboundFrame::new(action, Some(RequestId::from(7)), params)
    }

    #[tokio::test]
    async fn dispatch_success_echoes_request_id() {
        let (ctx, _rx) = make_test_context();
        let mut reg = ActionRegistry::new();
        reg.register("echo", EchoHandler);

        let reply = reg.dispatch(frame("echo", json!({"x": 1})), &ctx).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.action, "echo");
        assert_eq!(reply.request_id, Some(RequestId::from(7)));
        assert_eq!(reply.data, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn unknown_action_is_405() {
        let (ctx, _rx) = make_test_context();
        let reg = ActionRegistry::new();
        let reply = reg.dispatch(frame("vote", json!({})), &ctx).await;
        assert_eq!(reply.status, 405);
        assert_eq!(reply.errors, vec!["action 'vote' is not allowed".to_string()]);
        assert_eq!(reply.request_id, Some(RequestId::from(7)));
    }

    #[tokio::test]
    async fn internal_error_is_sanitized() {
        let (ctx, _rx) = make_test_context();
        let mut reg = ActionRegistry::new();
        reg.register("fail", FailHandler);
        let reply = reg.dispatch(frame("fail", json!({})), &ctx).await;
        assert_eq!(reply.status, 500);
        assert_eq!(reply.errors, vec!["Internal error".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let (ctx, _rx) = make_test_context();
        let mut reg = ActionRegistry::new().with_timeout(Duration::from_secs(2));
        reg.register("slow", SlowHandler);
        let reply = reg.dispatch(frame("slow", json!({})), &ctx).await;
        assert_eq!(reply.status, 504);
    }

    #[test]
    fn actions_are_sorted() {
        let mut reg = ActionRegistry::new();
        reg.register("b", EchoHandler);
        reg.register("a", EchoHandler);
        assert_eq!(reg.actions(), vec!["a".to_string(), "b".to_string()]);
        assert!(reg.has_action("a"));
        assert!(!reg.has_action("c"));
    }
}
