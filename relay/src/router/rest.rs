//! Templated REST Dispatcher
//!
//! Executes a declarative REST operation: builds URL, headers and optional
//! payload from the normalized request, sends it, then extracts and
//! transforms the response.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::blocks::{BlockConfig, TemplatedOperation};
use crate::common::{upstream_failure, AppError, AppResult};

use super::normalize::{Credentials, OperationInputs};

pub async fn dispatch(
    operation: &TemplatedOperation,
    credentials: &Credentials,
    inputs: &OperationInputs,
    config: &BlockConfig,
    http: &reqwest::Client,
) -> AppResult<Value> {
    if let Some(field) = inputs.missing(operation.required_fields).first() {
        return Err(AppError::missing_field(field));
    }

    let url = (operation.url)(inputs, config)?;
    let headers = (operation.headers)(credentials)?;
    let payload = match operation.payload {
        Some(build) => Some(build(inputs)?),
        None => None,
    };

    debug!("{:?} {}", operation.method, redact_query(&url));

    let mut request_builder = http.request(operation.method.as_reqwest(), &url);
    for (name, value) in &headers {
        request_builder = request_builder.header(*name, value);
    }
    if let Some(ref body) = payload {
        request_builder = request_builder.json(body);
    }

    let response = request_builder.send().await.map_err(|e| {
        error!("HTTP request failed: {}", e);
        AppError::from(e)
    })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::upstream(format!("Failed to read response body: {}", e)))?;

    if !status.is_success() {
        error!("HTTP request returned error status: {}", status);
        return Err(upstream_failure(status, &text));
    }

    // Empty successful responses (e.g. DELETE)
    let body = if text.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(&text)
            .map_err(|e| AppError::upstream(format!("Failed to parse response: {}", e)))?
    };

    let result = match operation.response_field {
        Some(field) => extract_json_path(&body, field).unwrap_or(Value::Null),
        None => body,
    };

    Ok(match operation.transform {
        Some(transform) => transform(result),
        None => result,
    })
}

/// Dotted path lookup (`a.b.c`).
fn extract_json_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
