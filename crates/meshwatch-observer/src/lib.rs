//! Broadcast hub and network boundary for the Meshwatch relay.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) that sends each subscriber an
//!   `initial-data` snapshot and then every live event, fanned out via
//!   [`tokio::sync::broadcast`]
//! - **Structured ingress** (`POST /api/messages`, `POST /api/messages/batch`)
//!   for agents that submit typed records instead of monitor text
//! - **Administrative endpoints** for deleting one message, clearing all
//!   state, reading a snapshot and health counts
//!
//! # Architecture
//!
//! [`AppState`] owns the mesh state and the subscriber registry behind a
//! single lock. Every mutation publishes its event while still holding
//! that lock, and every admission takes its snapshot and its broadcast
//! receiver under it too, so a subscriber never sees an update twice and
//! never misses one that happened after its snapshot. Socket writes
//! happen outside the lock.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::{AppState, HubStats, Subscription};
