//! Gmail block
//!
//! Native handlers: listing needs a list call followed by one detail call
//! per message, which a single templated request cannot express.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::types::{BlockAuth, BlockDefinition, ExecutionContext, NativeHandler};
use crate::common::{AppError, AppResult};
use crate::google::common::header_value;
use crate::google::GmailApi;
use crate::router::normalize::OperationInputs;

pub const BLOCK_ID: &str = "gmail";
pub const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

const DEFAULT_MAX_RESULTS: u64 = 10;
const MAX_RESULTS_LIMIT: u64 = 100;

pub fn block(base_url: &str) -> BlockDefinition {
    BlockDefinition::new(BLOCK_ID, BlockAuth::OAuthSession, base_url)
        .native("fetch", FetchMessages)
        .native("create", SendMessage)
        .native("update", ModifyLabels)
        .native("delete", TrashMessage)
}

fn api(ctx: &ExecutionContext<'_>) -> AppResult<GmailApi> {
    Ok(GmailApi::new(
        ctx.http.clone(),
        &ctx.config.base_url,
        ctx.credentials.bearer_token()?,
    ))
}

/// A string or an array of strings; comma-separated strings are split.
fn string_list(inputs: &OperationInputs, key: &str) -> AppResult<Vec<String>> {
    match inputs.params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| AppError::client_input(format!("{} must contain strings", key)))
            })
            .collect(),
        Some(_) => Err(AppError::client_input(format!(
            "{} must be a string or an array of strings",
            key
        ))),
    }
}

/// Flat view of a metadata-format message.
fn summarize(message: &Value) -> Value {
    json!({
        "id": message.get("id").cloned().unwrap_or(Value::Null),
        "threadId": message.get("threadId").cloned().unwrap_or(Value::Null),
        "labelIds": message.get("labelIds").cloned().unwrap_or_else(|| json!([])),
        "snippet": message.get("snippet").cloned().unwrap_or(Value::Null),
        "from": header_value(message, "From"),
        "to": header_value(message, "To"),
        "subject": header_value(message, "Subject"),
        "date": header_value(message, "Date"),
    })
}

// ── Handlers ────────────────────────────────────────────────────────────────

pub struct FetchMessages;

#[async_trait]
impl NativeHandler for FetchMessages {
    async fn execute(&self, ctx: &ExecutionContext<'_>) -> AppResult<Value> {
        let gmail = api(ctx)?;
        let max_results = ctx
            .inputs
            .u64("maxResults")
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT) as usize;
        let labels = string_list(ctx.inputs, "labelIds")?;

        let stubs = gmail
            .list_messages(ctx.inputs.str("query"), max_results, &labels)
            .await?;

        let mut messages = Vec::with_capacity(stubs.len());
        for stub in &stubs {
            let Some(id) = stub.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let message = gmail.get_message(id, "metadata").await?;
            messages.push(summarize(&message));
        }
        Ok(Value::Array(messages))
    }
}

pub struct SendMessage;

#[async_trait]
impl NativeHandler for SendMessage {
    fn required_fields(&self) -> &'static [&'static str] {
        &["to", "subject"]
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> AppResult<Value> {
        let to = string_list(ctx.inputs, "to")?;
        if to.is_empty() {
            return Err(AppError::missing_field("to"));
        }
        let cc = string_list(ctx.inputs, "cc")?;
        let bcc = string_list(ctx.inputs, "bcc")?;

        api(ctx)?
            .send_message(
                &to,
                ctx.inputs.require_str("subject")?,
                ctx.inputs.str("body").unwrap_or_default(),
                &cc,
                &bcc,
            )
            .await
    }
}

pub struct ModifyLabels;

#[async_trait]
impl NativeHandler for ModifyLabels {
    fn required_fields(&self) -> &'static [&'static str] {
        &["messageId"]
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> AppResult<Value> {
        let add = string_list(ctx.inputs, "addLabelIds")?;
        let remove = string_list(ctx.inputs, "removeLabelIds")?;
        if add.is_empty() && remove.is_empty() {
            return Err(AppError::client_input(
                "update requires addLabelIds or removeLabelIds",
            ));
        }

        api(ctx)?
            .modify_message(ctx.inputs.require_str("messageId")?, &add, &remove)
            .await
    }
}

pub struct TrashMessage;

#[async_trait]
impl NativeHandler for TrashMessage {
    fn required_fields(&self) -> &'static [&'static str] {
        &["messageId"]
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> AppResult<Value> {
        api(ctx)?
            .trash_message(ctx.inputs.require_str("messageId")?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::types::BlockConfig;
    use crate::router::normalize::Credentials;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        credentials: Credentials,
        config: BlockConfig,
        http: reqwest::Client,
    }

    impl Fixture {
        fn new(server: &MockServer) -> Self {
            Self {
                credentials: Credentials::from_value(&json!({"accessToken": "ya29.ok"})).unwrap(),
                config: BlockConfig {
                    base_url: server.uri(),
                },
                http: reqwest::Client::new(),
            }
        }

        async fn run(&self, handler: &dyn NativeHandler, params: Value) -> AppResult<Value> {
            let inputs = OperationInputs::from_params(&params).unwrap();
            let ctx = ExecutionContext {
                credentials: &self.credentials,
                inputs: &inputs,
                config: &self.config,
                http: &self.http,
            };
            handler.execute(&ctx).await
        }
    }

    #[tokio::test]
    async fn test_fetch_lists_then_loads_each_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/messages"))
            .and(query_param("maxResults", "2"))
            .and(header("authorization", "Bearer ya29.ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        for id in ["m1", "m2"] {
            Mock::given(method("GET"))
                .and(path(format!("/users/me/messages/{}", id)))
                .and(query_param("format", "metadata"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "threadId": "t",
                    "snippet": "hello",
                    "payload": {"headers": [{"name": "Subject", "value": format!("About {}", id)}]}
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let result = Fixture::new(&server)
            .run(&FetchMessages, json!({"maxResults": 2}))
            .await
            .unwrap();
        assert_eq!(result[0]["id"], "m1");
        assert_eq!(result[1]["subject"], "About m2");
    }

    #[tokio::test]
    async fn test_send_encodes_raw_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sent-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = Fixture::new(&server)
            .run(
                &SendMessage,
                json!({"to": "a@x.com, b@x.com", "subject": "Hi", "body": "There"}),
            )
            .await
            .unwrap();
        assert_eq!(result["id"], "sent-1");
    }

    #[tokio::test]
    async fn test_send_refuses_header_injection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = Fixture::new(&server)
            .run(
                &SendMessage,
                json!({"to": "a@x.com", "subject": "Hi\r\nBcc: evil@attacker.test", "body": "x"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_requires_a_label_change() {
        let server = MockServer::start().await;
        let err = Fixture::new(&server)
            .run(&ModifyLabels, json!({"messageId": "m1"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_posts_label_lists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/me/messages/m1/modify"))
            .and(body_partial_json(json!({"removeLabelIds": ["UNREAD"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        Fixture::new(&server)
            .run(&ModifyLabels, json!({"messageId": "m1", "removeLabelIds": ["UNREAD"]}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trash_surfaces_revoked_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/me/messages/m1/trash"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Insufficient Permission"}
            })))
            .mount(&server)
            .await;

        let err = Fixture::new(&server)
            .run(&TrashMessage, json!({"messageId": "m1"}))
            .await
            .unwrap_err();
        assert!(err.requires_reauth);
    }
}
