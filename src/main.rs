//! Gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing (Rule) ──▶ GatewayContext
//!                                                            │
//!                                         filter chain: auth → load_balance → proxy ──▶ Backend
//!                                                            │
//!     Client Response ◀── write back ◀── release buffer ◀────┘
//!
//!     Cross-cutting: config (+ watcher), observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gateway_core::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use gateway_core::lifecycle::{wait_for_signal, Shutdown};
use gateway_core::observability::{logging, metrics};
use gateway_core::GatewayServer;

#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "API gateway")]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if cli.check {
        println!("configuration ok: {} rule(s)", config.rules.len());
        return Ok(());
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher stops when dropped, so it lives for the whole run.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                signal_shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for signals"),
        }
    });

    let server = GatewayServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
