use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::wire::{
    BlockSummary, CallbackRequest, DispatchRequest, ErrorEnvelope, HealthResponse, RefreshRequest,
    SessionInfo, SuccessEnvelope, TokenResponse, NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER,
    USER_ID_HEADER,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay returned {status}: {}", .envelope.error)]
    Relay { status: u16, envelope: ErrorEnvelope },
}

impl ClientError {
    /// True when the relay says the end user has to authorize again.
    pub fn requires_reauth(&self) -> bool {
        match self {
            ClientError::Relay { envelope, .. } => envelope.requires_reauth.unwrap_or(false),
            ClientError::Http(_) => false,
        }
    }
}

/// Result of `POST /block/execute`
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub data: serde_json::Value,
    /// Set when the relay refreshed the caller's access token on the way.
    pub new_access_token: Option<String>,
}

pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
    user_key: Option<String>,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            user_key: None,
        })
    }

    /// Scope every call to a credential store key.
    pub fn with_user_key(mut self, user_key: impl Into<String>) -> Self {
        self.user_key = Some(user_key.into());
        self
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.request(self.http.get(self.url("/health"))).send().await?;
        decode(response).await
    }

    pub async fn blocks(&self) -> Result<Vec<BlockSummary>, ClientError> {
        let response = self.request(self.http.get(self.url("/blocks"))).send().await?;
        decode(response).await
    }

    pub async fn callback(&self, request: &CallbackRequest) -> Result<TokenResponse, ClientError> {
        let response = self
            .request(self.http.post(self.url("/oauth/callback")).json(request))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn refresh(&self, request: &RefreshRequest) -> Result<TokenResponse, ClientError> {
        let response = self
            .request(self.http.post(self.url("/oauth/refresh")).json(request))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn session(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<SessionInfo, ClientError> {
        let mut builder = self.request(self.http.get(self.url("/oauth/session")));
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(token) = refresh_token {
            builder = builder.header(REFRESH_TOKEN_HEADER, token);
        }
        decode(builder.send().await?).await
    }

    pub async fn execute(&self, request: &DispatchRequest) -> Result<ExecuteResult, ClientError> {
        let response = self
            .request(self.http.post(self.url("/block/execute")).json(request))
            .send()
            .await?;

        let new_access_token = response
            .headers()
            .get(NEW_ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let envelope: SuccessEnvelope = decode(response).await?;
        Ok(ExecuteResult {
            data: envelope.data,
            new_access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.user_key {
            Some(key) => builder.header(USER_ID_HEADER, key),
            None => builder,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let envelope = serde_json::from_str::<ErrorEnvelope>(&body).unwrap_or(ErrorEnvelope {
        error: format!("HTTP {}", status),
        requires_reauth: None,
        details: if body.is_empty() { None } else { Some(body) },
    });
    Err(ClientError::Relay {
        status: status.as_u16(),
        envelope,
    })
}
