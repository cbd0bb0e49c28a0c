//! Bluetooth Player (bluespin-bp) - Main entry point
//!
//! Unattended playback daemon: plays random tracks from a media-server
//! playlist to a Bluetooth audio sink, repairing the link and restarting
//! playback on its own. Designed to run from boot on a headless appliance
//! and be left alone.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bluespin_bp::catalog::CatalogClient;
use bluespin_bp::link::{BluetoothctlLink, LinkMonitor, LinkSettings};
use bluespin_bp::player::PlaybackSession;
use bluespin_bp::selector::TrackSelector;
use bluespin_bp::supervisor::{Supervisor, SupervisorPolicy};
use bluespin_common::Config;

/// Command-line arguments for bluespin-bp
#[derive(Parser, Debug)]
#[command(name = "bluespin-bp")]
#[command(about = "Bluetooth playlist player daemon")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "BLUESPIN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bluespin_bp=info,bluespin_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // **[BSP-REL-010]** Report exactly what is running
    info!(
        "Starting bluespin-bp {} ({}, {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP"),
    );

    let config_path =
        Config::resolve_path(args.config.as_deref()).context("No configuration file found")?;
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    // Wire the daemon together
    let link = LinkMonitor::new(
        Arc::new(BluetoothctlLink::new()),
        LinkSettings::from_config(&config),
    );

    let client = CatalogClient::new(&config.server.url, config.server.token.clone())
        .context("Failed to initialize media server client")?;
    let selector = TrackSelector::new(client, config.server.playlist_id);

    let session = PlaybackSession::new(config.playback.clone(), link.clone());

    let supervisor = Supervisor::new(
        SupervisorPolicy::from_config(&config),
        selector,
        link,
        session,
    );

    // Shutdown signal cancels the supervision loop
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    supervisor.run(&shutdown).await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
