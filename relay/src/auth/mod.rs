//! Auth
//!
//! OAuth credential lifecycle for session-backed blocks: the credential
//! store, the token refresher and the request-time auth guard.
//!
//! Bundles live in memory only. Two concurrent requests for the same user
//! may both refresh; the last successful write wins.

pub mod guard;
pub mod provider;
pub mod refresher;
pub mod store;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use blockrelay_protocol::TokenResponse;

pub use guard::{AuthGuard, GuardOutcome, RequestTokens, ResolvedSession};
pub use refresher::TokenRefresher;
pub use store::{CredentialStore, MemoryCredentialStore};

// ── Public types ────────────────────────────────────────────────────────────

/// Default token type when neither the store nor the provider names one
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// OAuth credentials for one authorized user/application pairing
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialBundle {
    #[zeroize(skip)]
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    #[zeroize(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    #[zeroize(skip)]
    pub token_type: String,
}

// Custom Debug implementation that redacts sensitive fields
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl CredentialBundle {
    /// Whether the access token must be refreshed before use.
    ///
    /// Expired means `now > expires_at - buffer`. A bundle without an expiry
    /// counts as expired when `missing_is_expired` is set.
    pub fn is_expired(&self, now: DateTime<Utc>, buffer: Duration, missing_is_expired: bool) -> bool {
        expiry_passed(self.expires_at, now, buffer, missing_is_expired)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_client_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn to_token_response(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at.unwrap_or_else(Utc::now),
            token_type: self.token_type.clone(),
        }
    }
}

/// Auth error codes carried in the error envelope's `error` field
pub mod codes {
    pub const CREDENTIALS_MISSING: &str = "credentials-missing";
    pub const TOKEN_MISSING: &str = "token-missing";
    pub const TOKEN_EXPIRED: &str = "token-expired";
    pub const REFRESH_FAILED: &str = "refresh-failed";
    pub const UPSTREAM_UNAUTHORIZED: &str = "upstream-unauthorized";
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// `now > expires_at - buffer`, with `missing_is_expired` deciding the
/// no-expiry case.
pub fn expiry_passed(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    buffer: Duration,
    missing_is_expired: bool,
) -> bool {
    match expires_at {
        Some(expires_at) => now > expires_at - buffer,
        None => missing_is_expired,
    }
}

/// Non-identifying user key for logs (first 8 bytes of SHA-256, hex).
pub fn user_fingerprint(user_key: &str) -> String {
    let hash = Sha256::digest(user_key.as_bytes());
    hex::encode(&hash[..8])
}

#[cfg(test)]
pub(crate) fn test_bundle(expires_at: Option<DateTime<Utc>>) -> CredentialBundle {
    CredentialBundle {
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
        access_token: "ya29.old".to_string(),
        refresh_token: Some("1//refresh".to_string()),
        expires_at,
        token_type: DEFAULT_TOKEN_TYPE.to_string(),
    }
}
