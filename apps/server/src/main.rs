//! SoundTouch Server - standalone simulated SoundTouch speaker.
//!
//! Serves the HTTP control API and the WebSocket push channel of a single
//! virtual speaker, for developing and testing SoundTouch clients without
//! hardware on the network.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use soundtouch_core::{start_simulator, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// SoundTouch Server - simulated Bose SoundTouch speaker.
#[derive(Parser, Debug)]
#[command(name = "soundtouch-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SOUNDTOUCH_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// HTTP control port (overrides config file).
    #[arg(long, env = "SOUNDTOUCH_HTTP_PORT")]
    http_port: Option<u16>,

    /// WebSocket push port (overrides config file).
    #[arg(long, env = "SOUNDTOUCH_WS_PORT")]
    ws_port: Option<u16>,

    /// Friendly device name (overrides config file).
    #[arg(short, long, env = "SOUNDTOUCH_NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("SoundTouch Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // CLI flags win over file and environment
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(port) = args.ws_port {
        config.ws_port = port;
    }
    if let Some(name) = args.name {
        config.name = name;
    }

    log::info!(
        "Configuration: device_id={}, http_port={}, ws_port={}",
        config.device_id,
        config.http_port,
        config.ws_port
    );

    let state = AppState::builder()
        .config(config.to_simulator_config())
        .build();
    let simulator = start_simulator(state)
        .await
        .context("Failed to start simulator")?;

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    simulator
        .shutdown()
        .await
        .context("Simulator stopped with an error")?;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed, that signal is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
