//! Block Registry
//!
//! Closed set of blocks, built once at startup and read-only afterwards.

use std::collections::BTreeMap;

use tracing::info;

use blockrelay_protocol::BlockSummary;

use super::types::{BlockAuth, BlockDefinition, OperationStrategy};
use super::{airtable, gmail, sheets};
use crate::common::{AppError, AppResult};
use crate::config::RelayConfig;

pub struct BlockRegistry {
    blocks: BTreeMap<&'static str, BlockDefinition>,
}

impl BlockRegistry {
    pub fn new(definitions: impl IntoIterator<Item = BlockDefinition>) -> Self {
        let blocks: BTreeMap<_, _> = definitions
            .into_iter()
            .map(|block| (block.block_id, block))
            .collect();
        Self { blocks }
    }

    /// Registry with the built-in blocks, using base URLs from `config`.
    pub fn builtin(config: &RelayConfig) -> Self {
        let registry = Self::new([
            sheets::block(&config.sheets_base_url),
            gmail::block(&config.gmail_base_url),
            airtable::block(&config.airtable_base_url),
        ]);
        info!(
            "Block registry initialized: {} blocks, {} operations",
            registry.blocks.len(),
            registry.blocks.values().map(|b| b.operations.len()).sum::<usize>()
        );
        registry
    }

    /// Look up a block and one of its operations.
    pub fn resolve(
        &self,
        block_id: &str,
        operation: &str,
    ) -> AppResult<(&BlockDefinition, &OperationStrategy)> {
        let block = self
            .blocks
            .get(block_id)
            .ok_or_else(|| AppError::unknown_block(block_id))?;
        let strategy = block
            .operations
            .get(operation)
            .ok_or_else(|| AppError::unknown_operation(block_id, operation))?;
        Ok((block, strategy))
    }

    pub fn list(&self) -> Vec<BlockSummary> {
        self.blocks
            .values()
            .map(|block| BlockSummary {
                block_id: block.block_id.to_string(),
                operations: block.operations.keys().map(|op| op.to_string()).collect(),
                requires_session: block.auth == BlockAuth::OAuthSession,
            })
            .collect()
    }
}
