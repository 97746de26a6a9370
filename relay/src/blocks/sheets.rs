//! Google Sheets block
//!
//! Row-oriented CRUD over the Sheets v4 values API. `rowIndex` indexes the
//! sheet's value grid from 0, where row 0 is the header row.

use serde_json::{json, Value};

use super::types::{
    oauth_bearer_headers, BlockAuth, BlockConfig, BlockDefinition, HttpMethod, TemplatedOperation,
};
use crate::common::{AppError, AppResult};
use crate::router::normalize::OperationInputs;

pub const BLOCK_ID: &str = "google-sheets";
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_SHEET: &str = "Sheet1";
/// Sheets caps a spreadsheet at 10 million cells, so no row lies beyond this.
pub const MAX_ROWS: u64 = 10_000_000;

pub fn block(base_url: &str) -> BlockDefinition {
    BlockDefinition::new(BLOCK_ID, BlockAuth::OAuthSession, base_url)
        .templated(
            "fetch",
            TemplatedOperation {
                method: HttpMethod::Get,
                url: fetch_url,
                headers: oauth_bearer_headers,
                payload: None,
                required_fields: &["spreadsheetId"],
                response_field: Some("values"),
                transform: Some(rows_or_empty),
            },
        )
        .templated(
            "create",
            TemplatedOperation {
                method: HttpMethod::Post,
                url: append_url,
                headers: oauth_bearer_headers,
                payload: Some(row_payload),
                required_fields: &["spreadsheetId", "values"],
                response_field: Some("updates"),
                transform: None,
            },
        )
        .templated(
            "update",
            TemplatedOperation {
                method: HttpMethod::Put,
                url: update_url,
                headers: oauth_bearer_headers,
                payload: Some(row_payload),
                required_fields: &["spreadsheetId", "rowIndex", "values"],
                response_field: None,
                transform: None,
            },
        )
        .templated(
            "delete",
            TemplatedOperation {
                method: HttpMethod::Post,
                url: clear_url,
                headers: oauth_bearer_headers,
                payload: Some(empty_payload),
                required_fields: &["spreadsheetId", "rowIndex"],
                response_field: None,
                transform: None,
            },
        )
}

/// 1-based A1 row number for a 0-based grid index.
pub fn a1_row(row_index: u64) -> AppResult<u64> {
    row_index
        .checked_add(1)
        .filter(|row| *row <= MAX_ROWS)
        .ok_or_else(|| AppError::client_input("rowIndex out of range"))
}

/// A1 range covering the row at `row_index` (0-based grid index).
pub fn row_range(sheet: &str, row_index: u64) -> AppResult<String> {
    Ok(format!("{}!A{}", sheet, a1_row(row_index)?))
}

fn sheet_name(inputs: &OperationInputs) -> &str {
    inputs.str("sheetName").unwrap_or(DEFAULT_SHEET)
}

fn values_url(inputs: &OperationInputs, config: &BlockConfig, range: &str) -> AppResult<String> {
    Ok(format!(
        "{}/{}/values/{}",
        config.base_url,
        urlencoding::encode(inputs.require_str("spreadsheetId")?),
        urlencoding::encode(range)
    ))
}

fn row_index(inputs: &OperationInputs) -> AppResult<u64> {
    inputs
        .u64("rowIndex")
        .ok_or_else(|| AppError::client_input("rowIndex must be a non-negative integer"))
}

fn fetch_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    let range = inputs
        .str("range")
        .map(String::from)
        .unwrap_or_else(|| sheet_name(inputs).to_string());
    values_url(inputs, config, &range)
}

fn append_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    let range = format!("{}!A1", sheet_name(inputs));
    Ok(format!(
        "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        values_url(inputs, config, &range)?
    ))
}

fn update_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    let range = row_range(sheet_name(inputs), row_index(inputs)?)?;
    Ok(format!(
        "{}?valueInputOption=USER_ENTERED",
        values_url(inputs, config, &range)?
    ))
}

fn clear_url(inputs: &OperationInputs, config: &BlockConfig) -> AppResult<String> {
    let sheet = sheet_name(inputs);
    let row = a1_row(row_index(inputs)?)?;
    let range = format!("{}!A{}:ZZ{}", sheet, row, row);
    Ok(format!("{}:clear", values_url(inputs, config, &range)?))
}

fn row_payload(inputs: &OperationInputs) -> AppResult<Value> {
    Ok(json!({
        "majorDimension": "ROWS",
        "values": [inputs.values.clone()],
    }))
}

fn empty_payload(_inputs: &OperationInputs) -> AppResult<Value> {
    Ok(json!({}))
}

/// An empty range comes back without `values`.
fn rows_or_empty(values: Value) -> Value {
    match values {
        Value::Null => json!([]),
        other => other,
    }
}
