use anyhow::Context;
use tracing_subscriber::EnvFilter;

use blockrelay_lib::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::load()
        .map_err(anyhow::Error::msg)
        .context("failed to load configuration")?;

    blockrelay_lib::run(config).await?;
    Ok(())
}
