//! Airtable block
//!
//! Record CRUD against the Airtable REST API. Authenticates with a personal
//! access token or API key passed as a bearer token.

use serde_json::{Map, Value};

use super::types::{BlockAuth, BlockConfig, BlockDefinition, HttpMethod, TemplatedOperation};
use crate::common::{interpolate_params, AppResult};
use crate::router::normalize::{Credentials, OperationInputs};

pub const BLOCK_ID: &str = "airtable-crud";
pub const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

pub fn block(base_url: &str) -> BlockDefinition {
    BlockDefinition::new(BLOCK_ID, BlockAuth::ApiKey, base_url)
        .templated(
            "fetch",
            TemplatedOperation {
                method: HttpMethod::Get,
                url: list_url,
                headers: api_key_headers,
                payload: None,
                required_fields: &["baseId", "tableName"],
                response_field: Some("records"),
                transform: Some(flatten_records),
            },
        )
        .templated(
            "create",
            TemplatedOperation {
                method: HttpMethod::Post,
                url: table_url,
                headers: api_key_headers,
                payload: Some(fields_payload),
                required_fields: &["baseId", "tableName", "dataFields"],
                response_field: None,
                transform: None,
            },
        )
        .templated(
            "update",
            TemplatedOperation {
                method: HttpMethod::Patch,
                url: record_url,
                headers: api_key_headers,
                payload: Some(fields_payload),
                required_fields: &["baseId", "tableName", "recordId", "dataFields"],
                response_field: None,
                transform: None,
            },
        )
        .templated(
            "delete",
            TemplatedOperation {
                method: HttpMethod::Delete,
                url: record_url,
                headers: api_key_headers,
                payload: None,
                required_fields: &["baseId", "tableName", "recordId"],
                response_field: None,
                transform: None,
            },
        )
}

fn api_key_headers(credentials: &Credentials) -> AppResult<Vec<(&'static str, String)>> {
    Ok(vec![
        (
            "Authorization",
            format!("Bearer {}", credentials.api_key_or_token()?),
        ),
        ("Content-Type", "application/json".to_string()),
    ])
}

fn table_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    inputs.require_str("baseId")?;
    inputs.require_str("tableName")?;
    Ok(format!(
        "{}{}",
        config.base_url,
        interpolate_params("/{baseId}/{tableName}", &inputs.params)
    ))
}

fn list_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    let mut url = table_url(inputs, config)?;
    let mut query = Vec::new();
    if let Some(size) = inputs.u64("pageSize").or_else(|| inputs.u64("maxResults")) {
        query.push(format!("pageSize={}", size.min(100)));
    }
    if let Some(formula) = inputs.str("query") {
        query.push(format!("filterByFormula={}", urlencoding::encode(formula)));
    }
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    Ok(url)
}

fn record_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    inputs.require_str("recordId")?;
    Ok(format!(
        "{}{}",
        table_url(inputs, config)?,
        interpolate_params("/{recordId}", &inputs.params)
    ))
}

fn fields_payload(inputs: &OperationInputs) -> AppResult<Value> {
    Ok(inputs.fields_payload())
}

/// `[{id, createdTime, fields: {..}}]` into `[{id, createdTime, ..fields}]`.
fn flatten_records(records: Value) -> Value {
    match records {
        Value::Array(records) => Value::Array(records.into_iter().map(flatten_record).collect()),
        Value::Null => Value::Array(Vec::new()),
        other => other,
    }
}

fn flatten_record(record: Value) -> Value {
    let Value::Object(mut record) = record else {
        return record;
    };
    let mut flat = Map::new();
    for key in ["id", "createdTime"] {
        if let Some(v) = record.remove(key) {
            flat.insert(key.to_string(), v);
        }
    }
    if let Some(Value::Object(fields)) = record.remove("fields") {
        for (k, v) in fields {
            flat.entry(k).or_insert(v);
        }
    }
    Value::Object(flat)
}
