//! Common Utilities
//!
//! Shared error handling, HTTP client and interpolation helpers.

pub mod error;
pub mod http;
pub mod interpolation;
pub mod paths;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use http::{create_http_client, upstream_failure};
pub use interpolation::interpolate_params;
pub use result::AppResult;
