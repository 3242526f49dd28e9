//! Subscription handlers: subscribe, unsubscribe, subscriptions.
//!
//! Subscriptions are keyed by the frame's `request_id`; every push caused by
//! a subscription echoes that id so the client can route it.

use agora_core::ids::opt_string_or_number;
use agora_core::RequestId;
use agora_pubsub::{SubscribeRequest, Topic, TopicSet};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::ActionContext;
use crate::rpc::errors::ActionError;
use crate::rpc::registry::{ActionHandler, ActionReply};
use crate::rpc::validation::{MAX_PARAM_LENGTH, parse_params, require_request_id, validate_string_param};

/// Request id wildcard for `subscription_request_id`.
const ANY_REQUEST_ID: &str = "*";

fn resolve(ctx: &ActionContext, request: &SubscribeRequest) -> Result<TopicSet, ActionError> {
    validate_string_param(&request.kind, "kind", MAX_PARAM_LENGTH)?;
    if let Some(pk) = &request.pk {
        validate_string_param(pk, "pk", MAX_PARAM_LENGTH)?;
    }
    if let Some(group) = &request.group {
        validate_string_param(&group.field, "group.field", MAX_PARAM_LENGTH)?;
        validate_string_param(&group.value, "group.value", MAX_PARAM_LENGTH)?;
    }
    Ok(ctx.router.topics_for_subscription(request)?)
}

fn topic_names(topics: &TopicSet) -> Vec<&str> {
    topics.iter().map(Topic::as_str).collect()
}

/// Subscribe the session to the topics named by `{kind, pk?, group?}`.
pub struct SubscribeHandler;

#[async_trait]
impl ActionHandler for SubscribeHandler {
    #[instrument(skip_all, fields(action = "subscribe", session_id = %ctx.session.id))]
    async fn handle(&self, params: Value, ctx: &ActionContext) -> Result<ActionReply, ActionError> {
        let request_id = require_request_id(ctx)?;
        let request: SubscribeRequest = parse_params(params)?;
        let topics = resolve(ctx, &request)?;
        for topic in &topics {
            let _ = ctx.subscriptions.subscribe(&ctx.session, topic, request_id.clone())?;
        }
        Ok(ActionReply::created(json!({ "topics": topic_names(&topics) })))
    }
}

#[derive(Debug, Deserialize)]
struct UnsubscribeParams {
    #[serde(flatten)]
    target: SubscribeRequest,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    subscription_request_id: Option<String>,
}

/// Remove the session's pairings on the named topics.
///
/// By default the pairing under the frame's `request_id` is removed.
/// `subscription_request_id` names another one; `"*"` removes every pairing
/// the session holds on those topics.
pub struct UnsubscribeHandler;

#[async_trait]
impl ActionHandler for UnsubscribeHandler {
    #[instrument(skip_all, fields(action = "unsubscribe", session_id = %ctx.session.id))]
    async fn handle(&self, params: Value, ctx: &ActionContext) -> Result<ActionReply, ActionError> {
        let params: UnsubscribeParams = parse_params(params)?;
        let selector: Option<RequestId> = match params.subscription_request_id.as_deref() {
            Some(ANY_REQUEST_ID) => None,
            Some(rid) => Some(RequestId::new(rid)),
            None => Some(require_request_id(ctx)?),
        };
        let topics = resolve(ctx, &params.target)?;
        let removed: usize = topics
            .iter()
            .map(|topic| ctx.subscriptions.unsubscribe(&ctx.session.id, topic, selector.as_ref()))
            .sum();
        Ok(ActionReply::ok(json!({
            "topics": topic_names(&topics),
            "removed": removed,
        })))
    }
}

/// List the session's topics and the request ids held on each.
pub struct ListSubscriptionsHandler;

#[async_trait]
impl ActionHandler for ListSubscriptionsHandler {
    async fn handle(&self, _params: Value, ctx: &ActionContext) -> Result<ActionReply, ActionError> {
        let subscriptions: Vec<Value> = ctx
            .subscriptions
            .topics_of(&ctx.session.id)
            .into_iter()
            .map(|(topic, request_ids)| json!({ "topic": topic, "request_ids": request_ids }))
            .collect();
        Ok(ActionReply::ok(json!({ "subscriptions": subscriptions })))
    }
}
