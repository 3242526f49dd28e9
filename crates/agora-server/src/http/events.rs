//! `POST /events`: change ingest for out-of-process storage collaborators.
//!
//! The body is one [`ChangeEvent`] or an array of them. Events are queued
//! on the change feed in body order. The whole body is validated before the
//! first event is queued, but a feed that stops mid-batch leaves the earlier
//! events queued; the 503 body reports how many were.

use agora_core::ChangeEvent;
use agora_pubsub::FeedError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::authorization_credential;
use crate::metrics::{INGEST_EVENTS_TOTAL, INGEST_REJECTED_TOTAL};
use crate::server::AppState;

/// Request body: a single event or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    /// Several events, dispatched in order.
    Many(Vec<ChangeEvent>),
    /// One event.
    One(ChangeEvent),
}

impl EventBatch {
    /// Flatten to a list.
    pub fn into_events(self) -> Vec<ChangeEvent> {
        match self {
            Self::Many(events) => events,
            Self::One(event) => vec![event],
        }
    }
}

/// Ingest failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or wrong bearer token.
    #[error("invalid ingest token")]
    Unauthorized,
    /// Body is not a change event or a list of them.
    #[error("{0}")]
    BadRequest(String),
    /// The feed worker stopped after `accepted` events of the batch were queued.
    #[error("{source}")]
    Feed {
        /// Events queued before the failure.
        accepted: usize,
        /// Feed failure.
        source: FeedError,
    },
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Feed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        counter!(INGEST_REJECTED_TOTAL, "status" => status.as_u16().to_string()).increment(1);
        let body = match &self {
            Self::Feed { accepted, .. } => json!({ "errors": [self.to_string()], "accepted": accepted }),
            _ => json!({ "errors": [self.to_string()] }),
        };
        (status, Json(body)).into_response()
    }
}

/// Whether the request carries the configured ingest token.
///
/// With no token configured ingest is open.
pub fn ingest_authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => authorization_credential(headers, "Bearer") == Some(expected),
    }
}

/// POST /events
pub async fn ingest_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EventBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), IngestError> {
    if !ingest_authorized(&headers, state.config.ingest_token.as_deref()) {
        warn!("ingest rejected: bad token");
        return Err(IngestError::Unauthorized);
    }
    let Json(batch) = body.map_err(|rejection| IngestError::BadRequest(rejection.body_text()))?;

    let events = batch.into_events();
    if events.iter().any(|event| event.entity.is_empty()) {
        return Err(IngestError::BadRequest("entity must not be empty".into()));
    }
    let mut accepted = 0;
    for event in events {
        debug!(entity = %event.entity, pk = %event.pk, change = event.change.as_str(), "ingest");
        if let Err(source) = state.feed.publish(event).await {
            if accepted > 0 {
                warn!(accepted, "change feed closed mid-batch");
            }
            return Err(IngestError::Feed { accepted, source });
        }
        accepted += 1;
        counter!(INGEST_EVENTS_TOTAL).increment(1);
    }
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))))
}
