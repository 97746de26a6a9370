//! Wire types and HTTP client for the blockrelay HTTP surface.

pub mod client;
pub mod wire;

pub use client::{ClientError, ExecuteResult, RelayClient};
pub use wire::{
    BlockSummary, CallbackRequest, DispatchRequest, ErrorEnvelope, HealthResponse, RefreshRequest,
    SessionInfo, SuccessEnvelope, TokenResponse, NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER,
    TOKEN_EXPIRES_AT_HEADER, USER_ID_HEADER,
};
