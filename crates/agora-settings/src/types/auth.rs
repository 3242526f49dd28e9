//! Connection and ingest credentials.

use std::collections::BTreeMap;

use agora_core::Principal;
use serde::{Deserialize, Serialize};

/// Static token table and ingest secret.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Token key to the principal it authenticates.
    pub tokens: BTreeMap<String, Principal>,
    /// Bearer token required on `POST /events`. `None` leaves ingest open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_token: Option<String>,
}
