//! Common Error Types
//!
//! Unified error taxonomy with HTTP status and envelope mapping.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blockrelay_protocol::ErrorEnvelope;

use crate::auth::codes;

/// Error categories surfaced at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing request fields (not retried)
    ClientInput,
    /// Token missing, invalid or expired-and-unrefreshable
    Auth,
    /// The downstream provider returned a non-auth failure
    Upstream,
    /// Unknown block or operation
    Registry,
    /// Relay-side failure unrelated to the request
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::ClientInput | ErrorKind::Registry => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Upstream | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub requires_reauth: bool,
    pub details: Option<String>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            requires_reauth: false,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn client_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::client_input(format!("Missing required field: {}", field))
    }

    /// Auth failure; `requires_reauth` tells the caller whether the end user
    /// has to go through authorization again.
    pub fn auth(code: &str, requires_reauth: bool) -> Self {
        Self {
            kind: ErrorKind::Auth,
            message: code.to_string(),
            requires_reauth,
            details: None,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    /// Failure reported by a downstream API. 401/403 mean the caller's
    /// grant is no longer good and the user has to authorize again.
    pub fn from_upstream_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::auth(codes::UPSTREAM_UNAUTHORIZED, true).with_details(message),
            429 => Self::upstream("Rate limited. Please try again later.").with_details(message),
            _ => Self::upstream(message),
        }
    }

    pub fn unknown_block(block_id: &str) -> Self {
        Self::new(ErrorKind::Registry, format!("Unknown block: {}", block_id))
    }

    pub fn unknown_operation(block_id: &str, operation: &str) -> Self {
        Self::new(
            ErrorKind::Registry,
            format!("Unknown operation '{}' for block '{}'", operation, block_id),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.message.clone(),
            requires_reauth: if self.kind == ErrorKind::Auth {
                Some(self.requires_reauth)
            } else {
                None
            },
            details: self.details.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_envelope())).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::upstream(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::client_input(format!("Invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::missing_field("baseId").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unknown_block("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::auth("token-missing", false).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::upstream("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_envelope_carries_reauth_only_for_auth_errors() {
        let env = AppError::auth("refresh-failed", true).to_envelope();
        assert_eq!(env.error, "refresh-failed");
        assert_eq!(env.requires_reauth, Some(true));

        let env = AppError::upstream("Airtable 500").with_details("body").to_envelope();
        assert_eq!(env.requires_reauth, None);
        assert_eq!(env.details.as_deref(), Some("body"));
    }

    #[test]
    fn test_upstream_auth_failures_require_reauth() {
        for status in [401, 403] {
            let err = AppError::from_upstream_status(status, "Google API error 401: Invalid Credentials");
            assert_eq!(err.kind, ErrorKind::Auth);
            assert!(err.requires_reauth);
            assert_eq!(err.message, codes::UPSTREAM_UNAUTHORIZED);
        }

        let err = AppError::from_upstream_status(404, "Not Found");
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(err.to_envelope().requires_reauth, None);
    }

    #[test]
    fn test_registry_messages_distinguish_block_and_operation() {
        assert_eq!(AppError::unknown_block("nope").message, "Unknown block: nope");
        assert_eq!(
            AppError::unknown_operation("gmail", "explode").message,
            "Unknown operation 'explode' for block 'gmail'"
        );
    }
}
