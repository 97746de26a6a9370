//! Route handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use blockrelay_protocol::{
    BlockSummary, CallbackRequest, DispatchRequest, HealthResponse, RefreshRequest, SessionInfo,
    SuccessEnvelope, TokenResponse, USER_ID_HEADER,
};

use super::AppState;
use crate::auth::guard::{append_refresh_headers, RequestTokens};
use crate::auth::{
    codes, user_fingerprint, CredentialBundle, ResolvedSession, DEFAULT_TOKEN_TYPE,
};
use crate::blocks::BlockAuth;
use crate::common::{AppError, AppResult};

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Parse a JSON body; an empty body yields the type's default.
fn parse_optional<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

/// `x-user-id` header, else the body's `userKey`, else the configured default.
fn resolve_user_key(state: &AppState, headers: &HeaderMap, body_key: Option<&str>) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(body_key)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(&state.config.default_user_key)
        .to_string()
}

fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::missing_field(field))
}

// ── Handlers ────────────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

pub async fn list_blocks(State(state): State<AppState>) -> Json<Vec<BlockSummary>> {
    Json(state.dispatcher.registry().list())
}

/// `POST /oauth/callback`: exchange an authorization code and store the bundle.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<TokenResponse>> {
    let request: CallbackRequest = parse_optional(&body)?;
    let code = required(&request.code, "code")?;
    let redirect_uri = required(&request.redirect_uri, "redirect_uri")?;
    let client_id = required(&request.client_id, "client_id")?;
    let client_secret = required(&request.client_secret, "client_secret")?;

    let user_key = resolve_user_key(&state, &headers, request.user_key.as_deref());
    let bundle = state
        .refresher
        .exchange(&user_key, code, redirect_uri, client_id, client_secret)
        .await?;

    info!("Stored new session for {}", user_fingerprint(&user_key));
    Ok(Json(bundle.to_token_response()))
}

/// `POST /oauth/refresh`: explicit refresh. Body values win over the stored
/// bundle so stateless callers can refresh without a prior callback.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<TokenResponse>> {
    let request: RefreshRequest = parse_optional(&body)?;
    let user_key = resolve_user_key(&state, &headers, request.user_key.as_deref());
    let stored = state.store.get(&user_key).await?;

    let supplied = RequestTokens {
        refresh_token: request.refresh_token.clone(),
        client_id: request.client_id.clone(),
        client_secret: request.client_secret.clone(),
        ..Default::default()
    }
    .or(RequestTokens::from_headers(&headers));

    let refresh_token = supplied
        .refresh_token
        .or_else(|| stored.as_ref().and_then(|b| b.refresh_token.clone()))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::missing_field("refresh_token"))?;

    let client_id = supplied
        .client_id
        .or_else(|| stored.as_ref().map(|b| b.client_id.clone()))
        .filter(|v| !v.is_empty());
    let client_secret = supplied
        .client_secret
        .or_else(|| stored.as_ref().map(|b| b.client_secret.clone()))
        .filter(|v| !v.is_empty());
    let (client_id, client_secret) = match (client_id, client_secret) {
        (Some(id), Some(secret)) => (id, secret),
        _ => return Err(AppError::auth(codes::CREDENTIALS_MISSING, false)),
    };

    let bundle = CredentialBundle {
        client_id,
        client_secret,
        access_token: stored
            .as_ref()
            .map(|b| b.access_token.clone())
            .unwrap_or_default(),
        refresh_token: Some(refresh_token),
        expires_at: stored.as_ref().and_then(|b| b.expires_at),
        token_type: stored
            .as_ref()
            .map(|b| b.token_type.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
    };

    let refreshed = state.refresher.refresh(&user_key, &bundle).await?;
    Ok(Json(refreshed.to_token_response()))
}

/// `POST /oauth/logout`: forget the stored bundle.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<SuccessEnvelope>> {
    let body: serde_json::Value = parse_optional(&body)?;
    let user_key = resolve_user_key(
        &state,
        &headers,
        body.get("userKey").and_then(|v| v.as_str()),
    );

    let removed = state.store.delete(&user_key).await?;
    info!(
        "Logout for {} (session removed: {})",
        user_fingerprint(&user_key),
        removed
    );
    Ok(Json(SuccessEnvelope::new(json!({ "removed": removed }))))
}

/// `GET /oauth/session`: behind the auth guard middleware.
pub async fn session(Extension(session): Extension<ResolvedSession>) -> Json<SessionInfo> {
    Json(SessionInfo {
        user_key: session.user_key,
        token_type: session.bundle.token_type.clone(),
        expires_at: session.bundle.expires_at,
        has_refresh_token: session.bundle.has_refresh_token(),
        refreshed: session.refreshed,
    })
}

/// `POST /block/execute`
pub async fn execute(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: DispatchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return AppError::from(e).into_response(),
    };

    let mut prepared = match state.dispatcher.prepare(&request) {
        Ok(prepared) => prepared,
        Err(e) => return e.into_response(),
    };

    let mut refreshed: Option<CredentialBundle> = None;
    if prepared.block.auth == BlockAuth::OAuthSession {
        let user_key = resolve_user_key(&state, &headers, request.user_key.as_deref());
        let tokens = RequestTokens::from_headers(&headers)
            .or(RequestTokens::from_credentials(&prepared.credentials));

        let outcome = match state.guard.authorize(&user_key, tokens).await {
            Ok(outcome) => outcome,
            Err(e) => return e.into_response(),
        };
        debug!(
            "Session for {} resolved (refreshed: {})",
            user_fingerprint(&user_key),
            outcome.refreshed
        );
        prepared.credentials.apply_bundle(&outcome.bundle);
        if outcome.refreshed {
            refreshed = Some(outcome.bundle);
        }
    }

    let mut response = match state.dispatcher.run(&prepared).await {
        Ok(data) => Json(SuccessEnvelope::new(data)).into_response(),
        Err(e) => e.into_response(),
    };
    if let Some(bundle) = refreshed {
        append_refresh_headers(response.headers_mut(), &bundle);
    }
    response
}
