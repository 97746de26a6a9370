//! Native Strategy Dispatcher
//!
//! Hands normalized inputs to a block's native handler and returns its
//! payload untouched.

use serde_json::Value;
use tracing::debug;

use crate::blocks::{BlockConfig, ExecutionContext, NativeHandler};
use crate::common::AppResult;

use super::normalize::{Credentials, OperationInputs};

pub async fn dispatch(
    handler: &dyn NativeHandler,
    credentials: &Credentials,
    inputs: &OperationInputs,
    config: &BlockConfig,
    http: &reqwest::Client,
) -> AppResult<Value> {
    debug!("Invoking native handler against {}", config.base_url);

    let ctx = ExecutionContext {
        credentials,
        inputs,
        config,
        http,
    };
    handler.execute(&ctx).await
}
