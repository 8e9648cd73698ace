//! Observer server startup helper for the bridge binary.
//!
//! Provides [`spawn_observer`] which launches the HTTP + `WebSocket`
//! server on a background Tokio task, so the listener supervision loop
//! can run alongside it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use meshwatch_observer::startup::spawn_observer;
//! use meshwatch_observer::state::AppState;
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::from_config(&config));
//! let handle = spawn_observer(Arc::clone(&state))?;
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerError, bind_address};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the observer HTTP server on a background Tokio task.
///
/// Returns a [`JoinHandle`] so the caller can abort or await the server
/// during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured host and port do
/// not form a valid address. This is checked before the task is spawned;
/// bind failures are logged from inside the task.
pub fn spawn_observer(state: Arc<AppState>) -> Result<JoinHandle<()>, StartupError> {
    let addr = bind_address(&state)?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(handle)
}
