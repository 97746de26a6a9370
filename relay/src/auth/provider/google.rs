//! Google OAuth2 Provider
//!
//! Authorization-code exchange and refresh against Google's token endpoint.
//! Client credentials are never built in; they travel with each bundle.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{error, info};

use super::{OAuthProvider, OAuthTokens, ProviderError};

// ── Google OAuth endpoints ──────────────────────────────────────────────────

pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Google OAuth2 provider.
pub struct GoogleProvider {
    http: reqwest::Client,
    token_endpoint: String,
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, TOKEN_ENDPOINT)
    }

    pub fn with_endpoint(http: reqwest::Client, token_endpoint: impl Into<String>) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        info!("Exchanging authorization code for tokens");

        let mut params = HashMap::new();
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);
        params.insert("code", code);
        params.insert("grant_type", "authorization_code");
        params.insert("redirect_uri", redirect_uri);

        let response = post_form(&self.http, &self.token_endpoint, &params).await?;
        parse_token_response(&response)
    }

    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        info!("Refreshing access token");

        let mut params = HashMap::new();
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);
        params.insert("refresh_token", refresh_token);
        params.insert("grant_type", "refresh_token");

        let response = post_form(&self.http, &self.token_endpoint, &params).await?;
        parse_token_response(&response)
    }
}

// ── HTTP utilities ──────────────────────────────────────────────────────────

/// POST a form-encoded request and return the parsed JSON body.
///
/// 400/401/403 responses, or any status carrying a grant-level OAuth error
/// code, are rejections. Everything else (connection failures, timeouts,
/// 429, 5xx) is a transport failure.
async fn post_form(
    http: &reqwest::Client,
    url: &str,
    params: &HashMap<&str, &str>,
) -> Result<serde_json::Value, ProviderError> {
    let response = http
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(format!("Failed to read response body: {}", e)))?;

    if !status.is_success() {
        error!("Token endpoint returned HTTP {}", status);
        let code = oauth_error_code(&body);
        let message = describe_error(&body).unwrap_or_else(|| format!("HTTP {}", status));
        let rejected = matches!(status.as_u16(), 400 | 401 | 403)
            || code.is_some_and(|c| REJECTION_CODES.contains(&c.as_str()));
        return if rejected {
            Err(ProviderError::Rejected(message))
        } else {
            Err(ProviderError::Transport(message))
        };
    }

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Transport(format!("Invalid JSON response: {}", e)))
}

/// OAuth `error` codes that mean the grant itself is no good.
const REJECTION_CODES: &[&str] = &["invalid_grant", "invalid_client", "unauthorized_client"];

fn oauth_error_code(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed.get("error")?.as_str().map(String::from)
}

/// `error: error_description` from an OAuth error body, if it has one.
fn describe_error(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let err = parsed.get("error").and_then(|v| v.as_str())?;
    let desc = parsed
        .get("error_description")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error");
    Some(format!("{}: {}", err, desc))
}

/// Parse a Google OAuth2 token response.
fn parse_token_response(parsed: &serde_json::Value) -> Result<OAuthTokens, ProviderError> {
    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let desc = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");
        return Err(ProviderError::Rejected(format!("{}: {}", err, desc)));
    }

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Transport("Missing access_token in response".to_string()))?
        .to_string();

    let refresh_token = parsed
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .map(String::from);

    let token_type = parsed
        .get("token_type")
        .and_then(|v| v.as_str())
        .map(String::from);

    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_at = chrono::Duration::try_seconds(expires_in)
        .and_then(|d| chrono::Utc::now().checked_add_signed(d))
        .ok_or_else(|| ProviderError::Transport(format!("Invalid expires_in: {}", expires_in)))?;

    Ok(OAuthTokens {
        access_token,
        refresh_token,
        token_type,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoogleProvider {
        GoogleProvider::with_endpoint(reqwest::Client::new(), format!("{}/token", server.uri()))
    }

    #[test]
    fn test_parse_token_response_success() {
        let body = json!({
            "access_token": "ya29.test",
            "refresh_token": "1//0e.test",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "https://www.googleapis.com/auth/gmail.modify"
        });

        let tokens = parse_token_response(&body).unwrap();
        assert_eq!(tokens.access_token, "ya29.test");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//0e.test"));
        assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_parse_token_response_defaults_expiry() {
        let before = chrono::Utc::now();
        let tokens = parse_token_response(&json!({"access_token": "ya29.test"})).unwrap();

        assert!(tokens.refresh_token.is_none());
        assert!(tokens.expires_at >= before + chrono::Duration::seconds(3599));
        assert!(tokens.expires_at <= chrono::Utc::now() + chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_parse_token_response_error() {
        let body = json!({"error": "invalid_grant", "error_description": "Token has been revoked"});
        match parse_token_response(&body) {
            Err(ProviderError::Rejected(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_posts_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Fold"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = provider(&server)
            .refresh_token("cid", "secret", "1//old")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "ya29.new");
    }

    #[tokio::test]
    async fn test_invalid_grant_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .refresh_token("cid", "secret", "1//revoked")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server)
            .exchange_code("code", "https://app/cb", "cid", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .refresh_token("cid", "secret", "1//old")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_grant_error_code_rejects_on_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "The OAuth client was not found."
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .refresh_token("cid", "secret", "1//old")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[test]
    fn test_parse_token_response_rejects_huge_expires_in() {
        let body = json!({"access_token": "ya29.test", "expires_in": i64::MAX});
        match parse_token_response(&body) {
            Err(ProviderError::Transport(msg)) => assert!(msg.contains("expires_in")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
