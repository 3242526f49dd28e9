//! System handlers: ping.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::ActionContext;
use crate::rpc::errors::ActionError;
use crate::rpc::registry::{ActionHandler, ActionReply};

/// Returns a pong with the current server timestamp.
pub struct PingHandler;

#[async_trait]
impl ActionHandler for PingHandler {
    #[instrument(skip_all, fields(action = "ping"))]
    async fn handle(&self, _params: Value, _ctx: &ActionContext) -> Result<ActionReply, ActionError> {
        Ok(ActionReply::ok(serde_json::json!({
            "pong": true,
            "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::make_test_context;

    #[tokio::test]
    async fn ping_returns_pong() {
        let (ctx, _rx) = make_test_context();
        let reply = PingHandler.handle(Value::Null, &ctx).await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.data["pong"], true);
        assert!(reply.data["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
