//! Google API Authenticated HTTP Client
//!
//! Bearer-authenticated requests against a Google REST base URL, sharing the
//! relay's HTTP client. Handles pagination and maps error responses into the
//! relay's error taxonomy (401/403 require re-authorization).

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error};

use crate::common::{upstream_failure, AppError, AppResult};

/// Google API HTTP client with OAuth token injection
pub struct GoogleClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GoogleClient {
    pub fn new(client: Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make an authenticated GET request
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> AppResult<Value> {
        let builder = self
            .client
            .get(self.url(path))
            .query(query)
            .bearer_auth(&self.access_token);

        self.execute_request(builder).await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post(&self, path: &str, body: &Value) -> AppResult<Value> {
        let builder = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .json(body);

        self.execute_request(builder).await
    }

    /// Execute a request and handle Google API response patterns
    async fn execute_request(&self, builder: RequestBuilder) -> AppResult<Value> {
        let response = builder.send().await?;

        let status = response.status();
        debug!("Google API response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let err = upstream_failure(status, &body);
            error!("Google API error: {}", err);
            return Err(err);
        }

        // Empty successful responses (e.g., DELETE)
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::upstream(format!("Failed to parse JSON response: {}", e)))
    }

    /// Collect items from `field` across `nextPageToken` pages, up to `max_results`.
    pub async fn get_paginated(
        &self,
        path: &str,
        field: &str,
        base_query: &[(&str, String)],
        max_results: usize,
    ) -> AppResult<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = base_query.to_vec();
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }
            query.push(("maxResults", (max_results - all_items.len()).to_string()));

            let response = self.get(path, &query).await?;
            all_items.extend(super::common::extract_array(&response, field));

            if all_items.len() >= max_results {
                all_items.truncate(max_results);
                break;
            }

            match response.get("nextPageToken").and_then(|v| v.as_str()) {
                Some(next_token) => page_token = Some(next_token.to_string()),
                None => break,
            }
        }

        Ok(all_items)
    }
}
