use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt};

use gitzip::config::ClientConfig;
use gitzip::transport::http_server::HttpServerApp;

#[derive(Parser)]
#[command(author, version, about = "GitHub search and ZIP download proxy server", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server with the /api/github/* HTTP interface
    Http {
        /// Address to bind the HTTP server to
        #[arg(short, long, default_value = "0.0.0.0:3000")]
        address: String,

        /// Enable debug logging
        #[arg(short, long)]
        debug: bool,

        /// GitHub API token for authentication (overrides GITHUB_TOKEN environment variable)
        #[arg(short = 't', long)]
        github_token: Option<String>,

        /// Timeout in seconds for API calls, and the longest an archive download may stall
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Allow cross-origin requests from any origin
        #[arg(long)]
        cors: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Http {
            address,
            debug,
            github_token,
            timeout_secs,
            cors,
        } => run_http_server(address, debug, github_token, timeout_secs, cors).await,
    }
}

async fn run_http_server(
    address: String,
    debug: bool,
    github_token: Option<String>,
    timeout_secs: u64,
    cors: bool,
) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{level},{}={level},tower_http={level}", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false), // Disable ANSI color codes
        )
        .init();

    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", address))?;

    if github_token.is_some() {
        tracing::info!("Using GitHub token from command line arguments");
    }

    let config =
        ClientConfig::from_env(github_token).with_timeout(Duration::from_secs(timeout_secs));

    HttpServerApp::new(addr, config).with_cors(cors).serve().await
}
