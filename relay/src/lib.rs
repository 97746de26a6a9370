pub mod auth;
pub mod blocks;
pub mod common;
pub mod config;
pub mod google;
pub mod router;
pub mod server;

pub use config::RelayConfig;
pub use server::{build_router, AppState};

/// Run the relay until shutdown.
pub async fn run(config: RelayConfig) -> common::AppResult<()> {
    tracing::info!(
        "Starting blockrelay {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr
    );
    server::serve(config).await
}
