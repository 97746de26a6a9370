mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use blockrelay_protocol::RelayClient;

#[derive(Parser, Debug)]
#[command(name = "blockrelay-cli", about = "Talk to a running blockrelay")]
struct Args {
    /// Relay base URL
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    url: String,

    /// Credential store key sent as x-user-id
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Liveness check
    Health,
    /// List registered blocks and their operations
    Blocks,
    /// Run one block operation
    Execute {
        #[arg(long)]
        block: String,
        #[arg(long)]
        operation: String,
        /// Operation params as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
        /// Credentials as a JSON object
        #[arg(long)]
        credentials: Option<String>,
    },
    /// Exchange an authorization code for tokens
    Callback {
        #[arg(long)]
        code: String,
        #[arg(long)]
        redirect_uri: String,
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
    },
    /// Force a token refresh
    Refresh {
        #[arg(long)]
        refresh_token: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Show the resolved session
    Session {
        #[arg(long)]
        access_token: Option<String>,
        #[arg(long)]
        refresh_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut client = RelayClient::new(&args.url)?;
    if let Some(user) = args.user {
        client = client.with_user_key(user);
    }

    let output = commands::run(&client, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
