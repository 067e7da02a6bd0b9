//! Inkless Relay Server
//!
//! A WebSocket server that is the only writer to the registry ledger.
//! The server provides:
//! - Anchoring with per-(fingerprint, signer) idempotency
//! - Verification and recent-anchor queries
//! - Batch sync of offline signatures
//!
//! Usage:
//!   inkless-relay [--port 8765] [--host 0.0.0.0] [--config relay.json]

use clap::Parser;
use inkless::config::RelayConfig;
use inkless::relay::server;
use inkless::{Authority, InMemoryLedger, RelayService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Inkless Relay Server
#[derive(Parser)]
#[command(name = "inkless-relay")]
#[command(about = "WebSocket relay that anchors document signatures on the public registry")]
struct Args {
    /// JSON config file; flags and environment override it
    #[arg(short, long, env = "INKLESS_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "INKLESS_RELAY_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "INKLESS_RELAY_HOST")]
    host: Option<String>,

    /// Ledger authority the relay writes as
    #[arg(long, env = "INKLESS_AUTHORITY")]
    authority: Option<String>,

    /// Simulated ledger confirmation latency in milliseconds
    #[arg(long)]
    confirmation_delay_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> inkless::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(authority) = self.authority {
            config.authority = authority;
        }
        if let Some(delay) = self.confirmation_delay_ms {
            config.confirmation_delay_ms = delay;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inkless=info,inkless_relay=info")),
        )
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let authority = Authority::new(config.authority.clone());
    let ledger = Arc::new(InMemoryLedger::with_confirmation_delay(
        authority.clone(),
        config.confirmation_delay(),
    ));
    let service = RelayService::new(ledger, authority)
        .with_confirmation_timeout(config.confirmation_timeout())
        .with_poll_interval(config.poll_interval());

    if let Err(e) = service.check_authority().await {
        error!("Ledger refuses writes from this relay: {}", e);
        std::process::exit(1);
    }
    let service = Arc::new(service);

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Inkless Relay Server listening on ws://{}", addr);
    info!("Writing to the registry as '{}'", service.authority());

    server::serve(listener, service).await;
}
