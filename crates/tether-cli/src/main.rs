//! # Tether
//!
//! Terminal client for realtime endpoints over WebSockets, Server-Sent
//! Events or long polling.
//!
//! ## Usage
//!
//! ```bash
//! # Connect with default settings
//! tether
//!
//! # Connect to a specific endpoint over long polling
//! tether --url https://example.com/chat --query id=42 --transport longpolling
//!
//! # Run with a config file
//! tether --config /path/to/tether.toml
//!
//! # Run with environment variables
//! TETHER_URL=http://localhost:5000/chat TETHER_TRANSPORT=sse tether
//! ```

mod config;
mod metrics;
mod session;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tether_transport::TransportType;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Terminal client for realtime endpoints")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint URL.
    #[arg(short, long)]
    url: Option<String>,

    /// Query string appended to the URL, without the leading `?`.
    #[arg(short, long)]
    query: Option<String>,

    /// Transport: websockets, serversentevents or longpolling.
    #[arg(short, long)]
    transport: Option<TransportType>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout carries payloads, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=info,tether_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(query) = args.query {
        config.query = query;
    }
    if let Some(transport) = args.transport {
        config.transport = transport;
    }

    tracing::info!("Connecting to {} via {}", config.url, config.transport);

    if config.metrics.enabled {
        metrics::start_metrics_server(config.metrics.port)?;
    }

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    session::run(&config, shutdown).await
}
