//! Principal resolution for incoming connections.
//!
//! Clients present a key either as `Authorization: Token <key>` or as a
//! `?token=<key>` query parameter (browsers cannot set headers on a
//! WebSocket handshake). Resolution happens before the gateway admits the
//! session.

use std::collections::{BTreeMap, HashMap};

use agora_core::Principal;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Resolves a presented key to a principal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `None` when the key is unknown or revoked.
    async fn authenticate(&self, key: &str) -> Option<Principal>;
}

/// Fixed token table loaded from settings.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Build from the `auth.tokens` settings table.
    pub fn new(tokens: &BTreeMap<String, Principal>) -> Self {
        Self {
            tokens: tokens.iter().map(|(k, p)| (k.clone(), p.clone())).collect(),
        }
    }

    /// Number of configured keys.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no keys are configured.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, key: &str) -> Option<Principal> {
        self.tokens.get(key).cloned()
    }
}

/// Extract the value after `scheme ` from the `Authorization` header.
pub fn authorization_credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (given, credential) = value.split_once(' ')?;
    if !given.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}

/// Connection key from the `Token` header, falling back to `?token=`.
pub fn extract_token<'a>(headers: &'a HeaderMap, query: &'a HashMap<String, String>) -> Option<&'a str> {
    authorization_credential(headers, "Token")
        .or_else(|| query.get("token").map(String::as_str).filter(|t| !t.is_empty()))
}
