//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS, request tracing, a body size limit and panic recovery.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ObserverError;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /ws` -- subscriber `WebSocket`
/// - `POST /api/messages/batch` -- structured batch ingress
/// - `POST /api/messages` -- structured single-record ingress
/// - `POST /api/messages/delete` -- delete one message
/// - `POST /api/messages/clear` -- clear all state
/// - `GET /api/snapshot` -- enriched state snapshot
/// - `GET /health` -- uptime and counts
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(&state.server.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.server.body_limit_bytes);

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_events))
        // Structured ingress
        .route("/api/messages", post(handlers::post_record))
        .route("/api/messages/batch", post(handlers::post_batch))
        // Administration
        .route("/api/messages/delete", post(handlers::delete_message))
        .route("/api/messages/clear", post(handlers::clear_all))
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/health", get(handlers::health))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Translate configured origins into a CORS policy. `*` (or an empty
/// list) allows any origin; unparseable entries are skipped.
fn allow_origin(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return AllowOrigin::any();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, "Ignoring unusable CORS origin: {e}");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

/// A handler panic becomes a generic 500 instead of tearing down the
/// connection.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");
    ObserverError::Internal(String::from("Internal server error")).into_response()
}
