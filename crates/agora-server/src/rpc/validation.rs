//! Parameter extraction and validation helpers.

use agora_core::RequestId;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::context::ActionContext;
use super::errors::ActionError;

/// Maximum length of a kind, pk, group field or group value (bytes).
pub const MAX_PARAM_LENGTH: usize = 256;

/// Deserialize `params` into `T`, mapping failures to `InvalidRequest`.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ActionError> {
    serde_json::from_value(params).map_err(|e| ActionError::InvalidRequest(format!("invalid params: {e}")))
}

/// The frame's request id, required by actions that key state on it.
pub fn require_request_id(ctx: &ActionContext) -> Result<RequestId, ActionError> {
    ctx.request_id
        .clone()
        .ok_or_else(|| ActionError::InvalidRequest("request_id is required".into()))
}

/// Reject a string parameter longer than `max_len` bytes.
pub fn validate_string_param(value: &str, name: &str, max_len: usize) -> Result<(), ActionError> {
    if value.len() > max_len {
        return Err(ActionError::InvalidRequest(format!(
            "parameter '{name}' exceeds maximum length ({} > {max_len})",
            value.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::make_test_context;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        kind: String,
    }

    #[test]
    fn parse_params_ok() {
        let p: Params = parse_params(json!({"kind": "ballot"})).unwrap();
        assert_eq!(p.kind, "ballot");
    }

    #[test]
    fn parse_params_missing_field() {
        let err = parse_params::<Params>(json!({})).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn request_id_required() {
        let (mut ctx, _rx) = make_test_context();
        ctx.request_id = None;
        assert_eq!(require_request_id(&ctx).unwrap_err().status(), 400);
        ctx.request_id = Some(RequestId::from(3));
        assert_eq!(require_request_id(&ctx).unwrap(), RequestId::from(3));
    }

    #[test]
    fn string_length_limit() {
        assert!(validate_string_param("ballot", "kind", MAX_PARAM_LENGTH).is_ok());
        let long = "x".repeat(MAX_PARAM_LENGTH + 1);
        let err = validate_string_param(&long, "kind", MAX_PARAM_LENGTH).unwrap_err();
        assert!(err.to_string().contains("'kind'"));
    }
}
