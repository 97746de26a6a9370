//! Request/response bodies exchanged with the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response header carrying a transparently refreshed access token.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";
/// Response header carrying the refreshed token's expiry (RFC 3339).
pub const TOKEN_EXPIRES_AT_HEADER: &str = "x-token-expires-at";
/// Request header carrying a caller-held refresh token.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
/// Request header selecting the credential store key.
pub const USER_ID_HEADER: &str = "x-user-id";

/// `POST /block/execute` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(rename = "blockId")]
    pub block_id: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub credentials: Value,
    #[serde(default, rename = "userKey", skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

/// Uniform success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub data: Value,
}

impl SuccessEnvelope {
    pub fn new(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Uniform error envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(
        default,
        rename = "requiresReauth",
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_reauth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// `POST /oauth/callback` body. Fields are optional so the relay can
/// report exactly which one is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default, rename = "userKey", skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

/// `POST /oauth/refresh` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, rename = "userKey", skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

/// Token bundle fields returned by the callback and refresh endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Non-secret view of a resolved session (`GET /oauth/session`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "userKey")]
    pub user_key: String,
    #[serde(rename = "tokenType")]
    pub token_type: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "hasRefreshToken")]
    pub has_refresh_token: bool,
    pub refreshed: bool,
}

/// Entry of `GET /blocks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    #[serde(rename = "blockId")]
    pub block_id: String,
    pub operations: Vec<String>,
    #[serde(rename = "requiresSession")]
    pub requires_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_request_uses_camel_case_ids() {
        let req: DispatchRequest = serde_json::from_value(json!({
            "blockId": "airtable-crud",
            "operation": "create",
            "params": {"baseId": "b1"}
        }))
        .unwrap();
        assert_eq!(req.block_id, "airtable-crud");
        assert_eq!(req.params["baseId"], "b1");
        assert!(req.credentials.is_null());
        assert!(req.user_key.is_none());
    }

    #[test]
    fn test_error_envelope_omits_empty_fields() {
        let env = ErrorEnvelope {
            error: "Unknown block: nope".to_string(),
            requires_reauth: None,
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"error": "Unknown block: nope"})
        );

        let env = ErrorEnvelope {
            error: "refresh-failed".to_string(),
            requires_reauth: Some(true),
            details: Some("invalid_grant".to_string()),
        };
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["requiresReauth"], true);
        assert_eq!(value["details"], "invalid_grant");
    }
}
