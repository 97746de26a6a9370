//! Gmail API v1 Client
//!
//! Provides methods for interacting with Gmail API:
//! - List/search messages
//! - Get message details
//! - Send plain-text emails
//! - Modify labels and trash messages

use super::client::GoogleClient;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::common::{AppError, AppResult};

pub struct GmailApi {
    client: GoogleClient,
}

impl GmailApi {
    pub fn new(http: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client: GoogleClient::new(http, base_url, access_token),
        }
    }

    /// List message stubs (`{id, threadId}`) matching a Gmail search query.
    pub async fn list_messages(
        &self,
        query: Option<&str>,
        max_results: usize,
        label_ids: &[String],
    ) -> AppResult<Vec<Value>> {
        info!("Listing Gmail messages");

        let mut query_params = vec![];
        if let Some(q) = query {
            query_params.push(("q", q.to_string()));
        }
        for label in label_ids {
            query_params.push(("labelIds", label.clone()));
        }

        let messages = self
            .client
            .get_paginated("/users/me/messages", "messages", &query_params, max_results)
            .await?;

        debug!("Retrieved {} messages", messages.len());
        Ok(messages)
    }

    /// Get a message by ID (`format`: full, metadata, minimal or raw).
    pub async fn get_message(&self, id: &str, format: &str) -> AppResult<Value> {
        debug!("Fetching Gmail message");

        let query_params = vec![("format", format.to_string())];
        let path = format!("/users/me/messages/{}", urlencoding::encode(id));
        self.client.get(&path, &query_params).await
    }

    /// Send a plain-text email. Returns the sent message's `{id, threadId}`.
    pub async fn send_message(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        cc: &[String],
        bcc: &[String],
    ) -> AppResult<Value> {
        info!("Sending Gmail message to {} recipient(s)", to.len());

        let raw_message = build_rfc2822(to, subject, body, cc, bcc)?;
        let request_body = json!({
            "raw": base64_url_encode(raw_message.as_bytes())
        });

        let response = self.client.post("/users/me/messages/send", &request_body).await?;
        info!("Message sent successfully");
        Ok(response)
    }

    /// Add and remove labels on a message
    pub async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> AppResult<Value> {
        info!("Modifying message labels");

        let mut body = json!({});
        if !add_label_ids.is_empty() {
            body["addLabelIds"] = json!(add_label_ids);
        }
        if !remove_label_ids.is_empty() {
            body["removeLabelIds"] = json!(remove_label_ids);
        }

        let path = format!("/users/me/messages/{}/modify", urlencoding::encode(message_id));
        self.client.post(&path, &body).await
    }

    /// Move a message to the trash
    pub async fn trash_message(&self, message_id: &str) -> AppResult<Value> {
        info!("Trashing message");

        let path = format!("/users/me/messages/{}/trash", urlencoding::encode(message_id));
        self.client.post(&path, &json!({})).await
    }
}

/// RFC 2822 plain-text message with CRLF line endings.
fn build_rfc2822(
    to: &[String],
    subject: &str,
    body: &str,
    cc: &[String],
    bcc: &[String],
) -> AppResult<String> {
    let mut message_parts = vec![
        header_line("To", &to.join(", "))?,
        header_line("Subject", subject)?,
    ];
    if !cc.is_empty() {
        message_parts.push(header_line("Cc", &cc.join(", "))?);
    }
    if !bcc.is_empty() {
        message_parts.push(header_line("Bcc", &bcc.join(", "))?);
    }
    message_parts.push("Content-Type: text/plain; charset=UTF-8".to_string());
    message_parts.push(String::new());
    message_parts.push(body.to_string());

    Ok(message_parts.join("\r\n"))
}

/// Header values must stay on one line.
fn header_line(name: &str, value: &str) -> AppResult<String> {
    if value.contains(|c: char| c == '\r' || c == '\n') {
        return Err(AppError::client_input(format!(
            "{} must not contain line breaks",
            name
        )));
    }
    Ok(format!("{}: {}", name, value))
}

/// Base64url encode (no padding) per RFC 4648 §5
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}
