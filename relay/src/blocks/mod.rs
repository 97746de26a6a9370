//! Blocks
//!
//! Integration targets and their operations.

pub mod airtable;
pub mod gmail;
pub mod registry;
pub mod sheets;
pub mod types;

pub use registry::BlockRegistry;
pub use types::{
    BlockAuth, BlockConfig, BlockDefinition, ExecutionContext, HttpMethod, NativeHandler,
    OperationStrategy, TemplatedOperation,
};
