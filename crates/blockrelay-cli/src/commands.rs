use anyhow::{bail, Context};
use serde_json::{json, Value};
use tracing::{debug, warn};

use blockrelay_protocol::{
    CallbackRequest, ClientError, DispatchRequest, RefreshRequest, RelayClient,
};

use crate::Command;

pub async fn run(client: &RelayClient, command: Command) -> anyhow::Result<Value> {
    let result = match command {
        Command::Health => serde_json::to_value(client.health().await?)?,
        Command::Blocks => serde_json::to_value(client.blocks().await?)?,
        Command::Execute {
            block,
            operation,
            params,
            credentials,
        } => {
            let request = DispatchRequest {
                block_id: block,
                operation,
                params: parse_object(&params, "params")?,
                credentials: match credentials {
                    Some(raw) => parse_object(&raw, "credentials")?,
                    None => Value::Null,
                },
                user_key: None,
            };
            debug!("Executing {}.{}", request.block_id, request.operation);

            let result = client.execute(&request).await.map_err(explain)?;
            match result.new_access_token {
                Some(token) => json!({ "data": result.data, "newAccessToken": token }),
                None => result.data,
            }
        }
        Command::Callback {
            code,
            redirect_uri,
            client_id,
            client_secret,
        } => {
            let request = CallbackRequest {
                code: Some(code),
                redirect_uri: Some(redirect_uri),
                client_id: Some(client_id),
                client_secret: Some(client_secret),
                user_key: None,
            };
            serde_json::to_value(client.callback(&request).await.map_err(explain)?)?
        }
        Command::Refresh {
            refresh_token,
            client_id,
            client_secret,
        } => {
            let request = RefreshRequest {
                refresh_token,
                client_id,
                client_secret,
                user_key: None,
            };
            serde_json::to_value(client.refresh(&request).await.map_err(explain)?)?
        }
        Command::Session {
            access_token,
            refresh_token,
        } => serde_json::to_value(
            client
                .session(access_token.as_deref(), refresh_token.as_deref())
                .await
                .map_err(explain)?,
        )?,
    };
    Ok(result)
}

/// Parse a JSON argument that has to be an object.
fn parse_object(raw: &str, name: &str) -> anyhow::Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", name))?;
    if !value.is_object() {
        bail!("--{} must be a JSON object", name);
    }
    Ok(value)
}

fn explain(err: ClientError) -> anyhow::Error {
    if err.requires_reauth() {
        warn!("The relay asks for the user to authorize again");
    }
    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        assert_eq!(
            parse_object(r#"{"baseId":"b1"}"#, "params").unwrap(),
            json!({"baseId": "b1"})
        );
        let err = parse_object("[1]", "params").unwrap_err();
        assert_eq!(err.to_string(), "--params must be a JSON object");
        assert!(parse_object("{", "credentials").is_err());
    }
}
