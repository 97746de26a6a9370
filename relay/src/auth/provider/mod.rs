//! OAuth Provider Abstraction
//!
//! Token-endpoint operations the relay needs: authorization-code exchange
//! and refresh.

pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Tokens returned from an OAuth token exchange or refresh.
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Absent when the provider keeps the existing refresh token.
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider refused the grant (revoked, expired, malformed, bad client).
    #[error("provider rejected the grant: {0}")]
    Rejected(String),

    /// Network failure or provider-side error; may be retried.
    #[error("token endpoint unavailable: {0}")]
    Transport(String),
}

/// OAuth provider trait.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name (e.g. "google")
    fn name(&self) -> &str;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<OAuthTokens, ProviderError>;

    /// Refresh an access token using a refresh token.
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens, ProviderError>;
}
