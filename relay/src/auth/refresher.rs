//! Token Refresher
//!
//! Exchanges refresh tokens (and authorization codes) at the provider and
//! writes the resulting bundle back to the credential store.

use std::sync::Arc;

use tracing::{info, warn};

use super::provider::{OAuthProvider, OAuthTokens, ProviderError};
use super::{codes, user_fingerprint, CredentialBundle, CredentialStore, DEFAULT_TOKEN_TYPE};
use crate::common::{AppError, AppResult};

pub struct TokenRefresher {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn OAuthProvider>,
}

impl TokenRefresher {
    pub fn new(store: Arc<dyn CredentialStore>, provider: Arc<dyn OAuthProvider>) -> Self {
        Self { store, provider }
    }

    /// Refresh `bundle` and persist the result under `user_key`.
    ///
    /// A grant the provider rejects surfaces as `refresh-failed` with
    /// `requiresReauth`; an unreachable provider surfaces as an upstream error.
    pub async fn refresh(&self, user_key: &str, bundle: &CredentialBundle) -> AppResult<CredentialBundle> {
        let refresh_token = match bundle.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AppError::auth(codes::REFRESH_FAILED, true)
                .with_details("No refresh token available")),
        };
        if !bundle.has_client_credentials() {
            return Err(AppError::auth(codes::CREDENTIALS_MISSING, false));
        }

        let user = user_fingerprint(user_key);
        info!("Refreshing {} token for {}", self.provider.name(), user);

        let tokens = self
            .provider
            .refresh_token(&bundle.client_id, &bundle.client_secret, refresh_token)
            .await
            .map_err(|e| {
                warn!("Token refresh for {} failed: {}", user, e);
                refresh_error(e)
            })?;

        let updated = apply_tokens(bundle, tokens);
        self.store.set(user_key, updated.clone()).await?;
        Ok(updated)
    }

    /// Exchange an authorization code and store the new bundle.
    pub async fn exchange(
        &self,
        user_key: &str,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> AppResult<CredentialBundle> {
        let user = user_fingerprint(user_key);
        info!("Exchanging {} authorization code for {}", self.provider.name(), user);

        let tokens = self
            .provider
            .exchange_code(code, redirect_uri, client_id, client_secret)
            .await
            .map_err(|e| {
                warn!("Code exchange for {} failed: {}", user, e);
                AppError::upstream("Token exchange failed").with_details(e.to_string())
            })?;

        let bundle = CredentialBundle {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: Some(tokens.expires_at),
            token_type: tokens
                .token_type
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        };
        self.store.set(user_key, bundle.clone()).await?;
        Ok(bundle)
    }
}

fn refresh_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::Rejected(msg) => AppError::auth(codes::REFRESH_FAILED, true).with_details(msg),
        ProviderError::Transport(msg) => {
            AppError::upstream("Token endpoint unavailable").with_details(msg)
        }
    }
}

/// New bundle from a refresh result. The refresh token is replaced only when
/// the provider issued a new one.
fn apply_tokens(bundle: &CredentialBundle, tokens: OAuthTokens) -> CredentialBundle {
    let mut updated = bundle.clone();
    updated.access_token = tokens.access_token.clone();
    if let Some(refresh_token) = tokens.refresh_token.as_ref() {
        updated.refresh_token = Some(refresh_token.clone());
    }
    updated.expires_at = Some(tokens.expires_at);
    if updated.token_type.is_empty() {
        updated.token_type = tokens
            .token_type
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
    }
    updated
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{test_bundle, MemoryCredentialStore};
    use crate::common::ErrorKind;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider double that counts calls and returns a canned outcome.
    pub(crate) struct StubProvider {
        pub calls: AtomicUsize,
        pub outcome: Result<(String, Option<String>), ProviderError>,
    }

    impl StubProvider {
        pub(crate) fn issuing(access_token: &str, refresh_token: Option<&str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Ok((access_token.to_string(), refresh_token.map(String::from))),
            }
        }

        pub(crate) fn failing(err: ProviderError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Err(err),
            }
        }

        fn tokens(&self) -> Result<OAuthTokens, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map(|(access, refresh)| OAuthTokens {
                access_token: format!("{}-{}", access, n),
                refresh_token: refresh,
                token_type: None,
                expires_at: Utc::now() + Duration::seconds(3600),
            })
        }
    }

    #[async_trait]
    impl OAuthProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _redirect_uri: &str,
            _client_id: &str,
            _client_secret: &str,
        ) -> Result<OAuthTokens, ProviderError> {
            self.tokens()
        }

        async fn refresh_token(
            &self,
            _client_id: &str,
            _client_secret: &str,
            _refresh_token: &str,
        ) -> Result<OAuthTokens, ProviderError> {
            self.tokens()
        }
    }

    fn refresher(provider: StubProvider) -> (TokenRefresher, Arc<MemoryCredentialStore>, Arc<StubProvider>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let provider = Arc::new(provider);
        let refresher = TokenRefresher::new(store.clone(), provider.clone());
        (refresher, store, provider)
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_provider_omits_it() {
        let (refresher, store, _) = refresher(StubProvider::issuing("ya29.new", None));
        let stale = test_bundle(Some(Utc::now() - Duration::minutes(1)));

        let updated = refresher.refresh("alice", &stale).await.unwrap();
        assert_eq!(updated.access_token, "ya29.new-0");
        assert_eq!(updated.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(updated.token_type, "Bearer");
        assert!(updated.expires_at.unwrap() > Utc::now());

        let stored = store.get("alice").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29.new-0");
    }

    #[tokio::test]
    async fn test_refresh_replaces_rotated_refresh_token() {
        let (refresher, _, _) = refresher(StubProvider::issuing("ya29.new", Some("1//rotated")));
        let updated = refresher.refresh("alice", &test_bundle(None)).await.unwrap();
        assert_eq!(updated.refresh_token.as_deref(), Some("1//rotated"));
    }

    #[tokio::test]
    async fn test_refresh_twice_yields_two_usable_tokens() {
        let (refresher, store, provider) = refresher(StubProvider::issuing("ya29.new", None));
        let stale = test_bundle(Some(Utc::now() - Duration::minutes(1)));

        let first = refresher.refresh("alice", &stale).await.unwrap();
        let second = refresher.refresh("alice", &stale).await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let stored = store.get("alice").await.unwrap().unwrap();
        assert_eq!(stored.access_token, second.access_token);
        assert_eq!(stored.client_id, "client-1");
    }

    #[tokio::test]
    async fn test_rejected_grant_requires_reauth() {
        let (refresher, store, _) = refresher(StubProvider::failing(ProviderError::Rejected(
            "invalid_grant".to_string(),
        )));

        let err = refresher.refresh("alice", &test_bundle(None)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(err.message, codes::REFRESH_FAILED);
        assert!(err.requires_reauth);
        assert!(store.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_reauth() {
        let (refresher, _, _) = refresher(StubProvider::failing(ProviderError::Transport(
            "connection refused".to_string(),
        )));

        let err = refresher.refresh("alice", &test_bundle(None)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert!(!err.requires_reauth);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_skips_provider() {
        let (refresher, _, provider) = refresher(StubProvider::issuing("ya29.new", None));
        let mut bundle = test_bundle(None);
        bundle.refresh_token = None;

        let err = refresher.refresh("alice", &bundle).await.unwrap_err();
        assert!(err.requires_reauth);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exchange_stores_bundle() {
        let (refresher, store, _) = refresher(StubProvider::issuing("ya29.first", Some("1//r")));
        let bundle = refresher
            .exchange("alice", "code", "https://app/cb", "cid", "secret")
            .await
            .unwrap();

        assert_eq!(bundle.access_token, "ya29.first-0");
        assert_eq!(bundle.token_type, DEFAULT_TOKEN_TYPE);
        assert!(store.get("alice").await.unwrap().is_some());
    }
}
