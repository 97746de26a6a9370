//! Block Router
//!
//! Resolves `{blockId, operation}` against the block registry, normalizes the
//! request and runs exactly one strategy: native handler or templated REST.

pub mod dispatcher;
pub mod native;
pub mod normalize;
pub mod rest;

pub use dispatcher::{BlockDispatcher, PreparedDispatch};
pub use normalize::{Credentials, OperationInputs};
