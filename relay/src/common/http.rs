//! HTTP Client Utilities
//!
//! Shared HTTP client creation with consistent configuration.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::error::AppError;

/// Create the relay's shared reqwest client.
///
/// One client is built at startup and cloned into the token endpoint,
/// templated REST calls and native handlers, so they share a pool and a
/// request timeout.
pub fn create_http_client(timeout_secs: u64) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
}

/// Best human-readable message from a downstream error body.
///
/// Understands Google's `{"error": {"code", "message"}}`, Airtable's
/// `{"error": {"type", "message"}}` and bare `{"error": "..."}` bodies.
pub fn extract_error_message(body: &str, status: StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    match error {
        Some(Value::String(s)) => format!("HTTP {}: {}", status.as_u16(), s),
        Some(obj) => {
            let message = obj
                .get("message")
                .and_then(|v| v.as_str())
                .or_else(|| obj.get("type").and_then(|v| v.as_str()));
            match message {
                Some(m) => format!("HTTP {}: {}", status.as_u16(), m),
                None => format!("HTTP {} error", status),
            }
        }
        None if body.trim().is_empty() => format!("HTTP {} error", status),
        None => format!("HTTP {}: {}", status.as_u16(), truncate(body.trim(), 200)),
    }
}

/// Map a non-success response to the relay's error taxonomy.
pub fn upstream_failure(status: StatusCode, body: &str) -> AppError {
    AppError::from_upstream_status(status.as_u16(), extract_error_message(body, status))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;

    #[test]
    fn test_extract_google_error() {
        let body = r#"{"error": {"code": 400, "message": "Invalid request format"}}"#;
        let msg = extract_error_message(body, StatusCode::BAD_REQUEST);
        assert!(msg.contains("400"));
        assert!(msg.contains("Invalid request format"));
    }

    #[test]
    fn test_extract_airtable_error() {
        let body = r#"{"error": {"type": "INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND"}}"#;
        let msg = extract_error_message(body, StatusCode::NOT_FOUND);
        assert!(msg.contains("INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND"));
    }

    #[test]
    fn test_plain_text_body_is_kept() {
        let msg = extract_error_message("upstream exploded", StatusCode::BAD_GATEWAY);
        assert_eq!(msg, "HTTP 502: upstream exploded");
    }

    #[test]
    fn test_forbidden_maps_to_reauth() {
        let err = upstream_failure(StatusCode::FORBIDDEN, "");
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.requires_reauth);
    }
}
