//! WebSocket wire frames.
//!
//! Inbound: `{"action": "...", "request_id": ..., ...params}`.
//! Outbound: `{"action": "...", "request_id": ..., "data" | "errors", "status": N}`,
//! plus `pk` on change pushes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::ChangeEvent;
use crate::ids::RequestId;

/// Reasons an inbound text frame could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Valid JSON, but not an object.
    #[error("Frame must be a JSON object")]
    NotAnObject,
    /// The `action` field is missing or not a string.
    #[error("Frame is missing a string 'action' field")]
    MissingAction,
}

/// Action request sent by a client.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    /// Action name (e.g. `subscribe`).
    pub action: String,
    /// Correlation id echoed on the reply and on subscription pushes.
    pub request_id: Option<RequestId>,
    /// Every other top-level field.
    pub params: Map<String, Value>,
}

impl InboundFrame {
    /// Build a frame directly (tests, in-process callers).
    pub fn new(action: impl Into<String>, request_id: Option<RequestId>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            action: action.into(),
            request_id,
            params,
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut params) = value else {
            return Err(FrameError::NotAnObject);
        };
        let action = match params.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Err(FrameError::MissingAction),
        };
        let request_id = match params.remove("request_id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<RequestId>(raw)?),
        };
        Ok(Self {
            action,
            request_id,
            params,
        })
    }

    /// Params as a JSON object value, for typed deserialization.
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

/// Server → client frame: action replies, change pushes, and lifecycle events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Action being replied to, or change kind for pushes.
    pub action: String,
    /// Correlation id, when the frame answers or belongs to a request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Primary key of the changed entity (pushes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// HTTP-style status code.
    pub status: u16,
}

impl Frame {
    /// Successful action reply.
    pub fn reply(
        action: impl Into<String>,
        request_id: Option<RequestId>,
        data: Value,
        status: u16,
    ) -> Self {
        Self {
            action: action.into(),
            request_id,
            pk: None,
            data: Some(data),
            errors: Vec::new(),
            status,
        }
    }

    /// Failed action reply.
    pub fn error(
        action: impl Into<String>,
        request_id: Option<RequestId>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            action: action.into(),
            request_id,
            pk: None,
            data: None,
            errors: vec![message.into()],
            status,
        }
    }

    /// Change push for one subscription.
    pub fn push(event: &ChangeEvent, request_id: RequestId, data: Value) -> Self {
        Self {
            action: event.change.as_str().to_owned(),
            request_id: Some(request_id),
            pk: Some(event.pk.clone()),
            data: Some(data),
            errors: Vec::new(),
            status: event.change.status(),
        }
    }

    /// Uncorrelated server event (e.g. `connection.established`).
    pub fn notice(action: impl Into<String>, data: Value) -> Self {
        Self::reply(action, None, data, 200)
    }

    /// Whether this frame reports success.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.status < 400
    }
}
