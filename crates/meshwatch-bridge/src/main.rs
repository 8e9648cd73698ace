//! Meshwatch bridge binary.
//!
//! Relays a radio-mesh monitor's text output to live `WebSocket`
//! subscribers. It loads configuration, starts the observer server, then
//! supervises the monitor process and feeds its output through the
//! record parser into the shared hub.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `meshwatch-config.yaml` (or `MESHWATCH_CONFIG`)
//! 3. Create the hub from the configured limits
//! 4. Start the observer HTTP + `WebSocket` server
//! 5. Spawn and supervise the listener process, unless disabled
//! 6. Run until `Ctrl-C`

mod error;
mod listener;

use std::path::PathBuf;
use std::sync::Arc;

use meshwatch_core::MeshwatchConfig;
use meshwatch_observer::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::BridgeError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "meshwatch-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the server address is
/// unusable, or the shutdown signal cannot be installed.
#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("meshwatch-bridge starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        max_messages = config.limits.max_messages,
        max_subscribers = config.limits.max_subscribers,
        aliases = config.node_aliases.len(),
        "Configuration loaded"
    );

    // 3. Create the hub.
    let state = Arc::new(AppState::from_config(&config));

    // 4. Start the observer server.
    let observer_handle = meshwatch_observer::spawn_observer(Arc::clone(&state))?;

    // 5. Supervise the listener.
    let listener_handle = if config.listener.enabled {
        let settings = config.listener.clone();
        let listener_state = Arc::clone(&state);
        Some(tokio::spawn(async move {
            if let Err(e) = listener::run(&settings, listener_state).await {
                error!(error = %e, "Listener supervision failed");
            }
        }))
    } else {
        info!("Listener disabled, structured ingress only");
        None
    };

    // 6. Wait for shutdown.
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| BridgeError::Signal {
            message: format!("{e}"),
        })?;
    info!("Shutdown requested");

    if let Some(handle) = listener_handle {
        handle.abort();
    }
    observer_handle.abort();

    info!(uptime_secs = state.uptime().as_secs(), "meshwatch-bridge shutdown complete");
    Ok(())
}

/// Load configuration from `MESHWATCH_CONFIG` or `meshwatch-config.yaml`.
///
/// A missing file yields the defaults; environment overrides apply either
/// way.
fn load_config() -> Result<MeshwatchConfig, BridgeError> {
    let config_path = std::env::var_os("MESHWATCH_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        info!(path = %config_path.display(), "Reading config file");
        Ok(MeshwatchConfig::from_file(&config_path)?)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        let mut config = MeshwatchConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
