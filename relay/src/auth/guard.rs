//! Auth Guard
//!
//! Resolves the effective OAuth bundle for a request, refreshing it when it
//! is inside the buffer window, and hands the result to the handler as a
//! request extension.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use blockrelay_protocol::{
    NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER, TOKEN_EXPIRES_AT_HEADER, USER_ID_HEADER,
};

use super::{
    codes, expiry_passed, user_fingerprint, CredentialBundle, CredentialStore, TokenRefresher,
    DEFAULT_TOKEN_TYPE,
};
use crate::common::{AppError, AppResult};
use crate::router::normalize::Credentials;
use crate::server::AppState;

// ── Request-supplied tokens ─────────────────────────────────────────────────

/// Token material supplied with a single request. Anything set here wins
/// over the stored bundle.
#[derive(Clone, Default)]
pub struct RequestTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for RequestTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl RequestTokens {
    /// `Authorization: Bearer <token>` and `x-refresh-token`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let access_token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let refresh_token = headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            access_token,
            refresh_token,
            ..Default::default()
        }
    }

    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            access_token: credentials.access_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
            expires_at: credentials.expires_at,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
        }
    }

    /// Fill unset fields from `fallback`; fields already set are kept.
    pub fn or(self, fallback: RequestTokens) -> Self {
        Self {
            access_token: self.access_token.or(fallback.access_token),
            refresh_token: self.refresh_token.or(fallback.refresh_token),
            expires_at: self.expires_at.or(fallback.expires_at),
            client_id: self.client_id.or(fallback.client_id),
            client_secret: self.client_secret.or(fallback.client_secret),
        }
    }
}

// ── Guard ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub bundle: CredentialBundle,
    /// A refresh happened and the caller should pick up the new token.
    pub refreshed: bool,
}

/// Session attached to a request that passed the guard.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub user_key: String,
    pub bundle: CredentialBundle,
    pub refreshed: bool,
}

pub struct AuthGuard {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<TokenRefresher>,
    buffer: Duration,
    missing_expiry_is_expired: bool,
}

impl AuthGuard {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<TokenRefresher>,
        buffer: Duration,
        missing_expiry_is_expired: bool,
    ) -> Self {
        Self {
            store,
            refresher,
            buffer,
            missing_expiry_is_expired,
        }
    }

    /// Resolve the bundle to use for `user_key`.
    ///
    /// Request-supplied values override the stored bundle. A request-supplied
    /// `expires_at` only affects this check and is not written back unless a
    /// refresh replaces the stored bundle.
    pub async fn authorize(&self, user_key: &str, tokens: RequestTokens) -> AppResult<GuardOutcome> {
        let stored = self.store.get(user_key).await?;
        let user = user_fingerprint(user_key);

        let from_store = |f: fn(&CredentialBundle) -> Option<String>| stored.as_ref().and_then(f);
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let client_id = non_empty(tokens.client_id.or_else(|| from_store(|b| Some(b.client_id.clone()))));
        let client_secret =
            non_empty(tokens.client_secret.or_else(|| from_store(|b| Some(b.client_secret.clone()))));
        let (client_id, client_secret) = match (client_id, client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                debug!("No client credentials for {}", user);
                return Err(AppError::auth(codes::CREDENTIALS_MISSING, false));
            }
        };

        let access_token =
            non_empty(tokens.access_token.or_else(|| from_store(|b| Some(b.access_token.clone()))))
                .ok_or_else(|| {
                    debug!("No access token for {}", user);
                    AppError::auth(codes::TOKEN_MISSING, false)
                })?;

        let refresh_token = non_empty(tokens.refresh_token.or_else(|| from_store(|b| b.refresh_token.clone())));
        let token_type = from_store(|b| Some(b.token_type.clone()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
        let expires_at = tokens
            .expires_at
            .or_else(|| stored.as_ref().and_then(|b| b.expires_at));

        let bundle = CredentialBundle {
            client_id,
            client_secret,
            access_token,
            refresh_token,
            expires_at,
            token_type,
        };

        if !expiry_passed(bundle.expires_at, Utc::now(), self.buffer, self.missing_expiry_is_expired) {
            return Ok(GuardOutcome {
                bundle,
                refreshed: false,
            });
        }

        if !bundle.has_refresh_token() {
            warn!("Access token for {} expired and no refresh token is available", user);
            return Err(AppError::auth(codes::TOKEN_EXPIRED, true));
        }

        debug!("Access token for {} is inside the buffer window, refreshing", user);
        let refreshed = self.refresher.refresh(user_key, &bundle).await?;
        Ok(GuardOutcome {
            bundle: refreshed,
            refreshed: true,
        })
    }
}

// ── HTTP glue ───────────────────────────────────────────────────────────────

/// Store key for a request: the `x-user-id` header, else `fallback`.
pub fn user_key_from_headers(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Expose a refreshed token to stateless callers.
pub fn append_refresh_headers(headers: &mut HeaderMap, bundle: &CredentialBundle) {
    if let Ok(value) = HeaderValue::from_str(&bundle.access_token) {
        headers.insert(NEW_ACCESS_TOKEN_HEADER, value);
    }
    if let Some(expires_at) = bundle.expires_at {
        if let Ok(value) = HeaderValue::from_str(&expires_at.to_rfc3339()) {
            headers.insert(TOKEN_EXPIRES_AT_HEADER, value);
        }
    }
}

/// Middleware for header-authenticated routes.
pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let user_key = user_key_from_headers(request.headers(), &state.config.default_user_key);
    let tokens = RequestTokens::from_headers(request.headers());

    let outcome = match state.guard.authorize(&user_key, tokens).await {
        Ok(outcome) => outcome,
        Err(e) => return e.into_response(),
    };

    let refreshed = outcome.refreshed.then(|| outcome.bundle.clone());
    request.extensions_mut().insert(ResolvedSession {
        user_key,
        bundle: outcome.bundle,
        refreshed: outcome.refreshed,
    });

    let mut response = next.run(request).await;
    if let Some(bundle) = refreshed {
        append_refresh_headers(response.headers_mut(), &bundle);
    }
    response
}
