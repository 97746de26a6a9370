//! Block Dispatcher
//!
//! Single entry point for block operations: `prepare` validates everything
//! that can be checked locally, `run` executes the chosen strategy.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use blockrelay_protocol::DispatchRequest;

use crate::blocks::{BlockDefinition, BlockRegistry, OperationStrategy};
use crate::common::{AppError, AppResult};

use super::normalize::{Credentials, OperationInputs};
use super::{native, rest};

/// The block dispatcher
pub struct BlockDispatcher {
    registry: Arc<BlockRegistry>,
    http: reqwest::Client,
}

/// A resolved and validated dispatch, ready to execute.
///
/// Credentials may still be replaced (by the auth guard) before `run`.
pub struct PreparedDispatch<'a> {
    pub block: &'a BlockDefinition,
    pub operation: String,
    pub strategy: &'a OperationStrategy,
    pub credentials: Credentials,
    pub inputs: OperationInputs,
}

impl BlockDispatcher {
    pub fn new(registry: Arc<BlockRegistry>, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Resolve, normalize and validate a request. Nothing here touches the
    /// network, so every failure is a registry or client-input error.
    pub fn prepare<'a>(&'a self, request: &DispatchRequest) -> AppResult<PreparedDispatch<'a>> {
        let (block, strategy) = self
            .registry
            .resolve(&request.block_id, &request.operation)?;

        let credentials = Credentials::from_value(&request.credentials)?;
        let inputs = OperationInputs::from_params(&request.params)?;

        let missing = inputs.missing(strategy.required_fields());
        if let Some(first) = missing.first() {
            debug!(
                "Rejecting {}.{}: missing {:?}",
                block.block_id, request.operation, missing
            );
            let mut err = AppError::missing_field(first);
            if missing.len() > 1 {
                err = err.with_details(format!("Missing fields: {}", missing.join(", ")));
            }
            return Err(err);
        }

        Ok(PreparedDispatch {
            block,
            operation: request.operation.clone(),
            strategy,
            credentials,
            inputs,
        })
    }

    /// Execute a prepared dispatch.
    pub async fn run(&self, prepared: &PreparedDispatch<'_>) -> AppResult<Value> {
        let block = prepared.block;
        info!(
            "Dispatching {}.{} ({})",
            block.block_id,
            prepared.operation,
            prepared.strategy.kind()
        );

        let result = match prepared.strategy {
            OperationStrategy::Native(handler) => {
                native::dispatch(
                    handler.as_ref(),
                    &prepared.credentials,
                    &prepared.inputs,
                    &block.config,
                    &self.http,
                )
                .await
            }
            OperationStrategy::Templated(operation) => {
                rest::dispatch(
                    operation,
                    &prepared.credentials,
                    &prepared.inputs,
                    &block.config,
                    &self.http,
                )
                .await
            }
        };

        if let Err(ref e) = result {
            warn!("{}.{} failed: {}", block.block_id, prepared.operation, e);
        }
        result
    }

    /// Prepare and run in one step, without the auth guard.
    pub async fn dispatch(&self, request: &DispatchRequest) -> AppResult<Value> {
        let prepared = self.prepare(request)?;
        self.run(&prepared).await
    }
}
