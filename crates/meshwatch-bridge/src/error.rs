//! Error types for the bridge binary.
//!
//! [`BridgeError`] is the top-level error type that wraps all possible
//! failure modes during startup and listener supervision.

/// Top-level error for the bridge binary.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: meshwatch_core::ConfigError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: meshwatch_observer::StartupError,
    },

    /// The listener process could not be started.
    #[error("failed to spawn listener `{program}`: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A pipe to the listener process was not available.
    #[error("listener {stream} is not piped")]
    Pipe {
        /// `stdout` or `stderr`.
        stream: &'static str,
    },

    /// Waiting for the listener process failed.
    #[error("listener wait failed: {source}")]
    Wait {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Installing the shutdown signal handler failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the failure.
        message: String,
    },
}
