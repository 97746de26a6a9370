//! Block Types
//!
//! A block is a named integration target with a fixed set of operations.
//! Each operation is either a native handler that performs its own request
//! sequencing, or a templated REST call described entirely by data.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::AppResult;
use crate::router::normalize::{Credentials, OperationInputs};

/// Static parameters shared by every operation of a block.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

pub type UrlBuilder = fn(&OperationInputs, &BlockConfig) -> AppResult<String>;
pub type HeaderBuilder = fn(&Credentials) -> AppResult<Vec<(&'static str, String)>>;
pub type PayloadBuilder = fn(&OperationInputs) -> AppResult<Value>;
pub type OutputTransform = fn(Value) -> Value;

/// Declarative REST call.
#[derive(Clone, Copy)]
pub struct TemplatedOperation {
    pub method: HttpMethod,
    pub url: UrlBuilder,
    pub headers: HeaderBuilder,
    /// No builder means no request body.
    pub payload: Option<PayloadBuilder>,
    pub required_fields: &'static [&'static str],
    /// Field extracted from the response body; the whole body when unset.
    pub response_field: Option<&'static str>,
    pub transform: Option<OutputTransform>,
}

/// Everything a native handler may touch.
pub struct ExecutionContext<'a> {
    pub credentials: &'a Credentials,
    pub inputs: &'a OperationInputs,
    pub config: &'a BlockConfig,
    pub http: &'a reqwest::Client,
}

/// Operation implemented in code, for APIs that need more than one call.
#[async_trait]
pub trait NativeHandler: Send + Sync {
    /// Inputs checked by the dispatcher before `execute` runs.
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> AppResult<Value>;
}

#[derive(Clone)]
pub enum OperationStrategy {
    Native(Arc<dyn NativeHandler>),
    Templated(TemplatedOperation),
}

impl OperationStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationStrategy::Native(_) => "native",
            OperationStrategy::Templated(_) => "templated",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            OperationStrategy::Native(handler) => handler.required_fields(),
            OperationStrategy::Templated(op) => op.required_fields,
        }
    }
}

/// How a block authenticates its downstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAuth {
    /// OAuth access token resolved through the auth guard
    OAuthSession,
    /// Caller-supplied API key, no session handling
    ApiKey,
}

pub struct BlockDefinition {
    pub block_id: &'static str,
    pub auth: BlockAuth,
    pub config: BlockConfig,
    pub operations: BTreeMap<&'static str, OperationStrategy>,
}

impl BlockDefinition {
    pub fn new(block_id: &'static str, auth: BlockAuth, base_url: impl Into<String>) -> Self {
        Self {
            block_id,
            auth,
            config: BlockConfig {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
            operations: BTreeMap::new(),
        }
    }

    pub fn templated(mut self, name: &'static str, operation: TemplatedOperation) -> Self {
        self.operations
            .insert(name, OperationStrategy::Templated(operation));
        self
    }

    pub fn native(mut self, name: &'static str, handler: impl NativeHandler + 'static) -> Self {
        self.operations
            .insert(name, OperationStrategy::Native(Arc::new(handler)));
        self
    }
}

/// `Authorization: Bearer <token>` from the session access token.
pub fn oauth_bearer_headers(credentials: &Credentials) -> AppResult<Vec<(&'static str, String)>> {
    Ok(vec![(
        "Authorization",
        format!("Bearer {}", credentials.bearer_token()?),
    )])
}
