//! `WebSocket` handler for live mesh events.
//!
//! Clients connect to `GET /ws`. An admitted client first receives one
//! `initial-data` event with the enriched message history and node
//! positions, then every event the hub publishes. When the subscriber
//! limit is reached the upgrade is refused with 503; a client that races
//! past that check is closed with code 1013 (try again later) before any
//! data is sent.
//!
//! If a client falls behind, lagged events are skipped and the client
//! resumes from the most recent one.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use meshwatch_types::MeshEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::error::ObserverError;
use crate::state::{AppState, Subscription};

/// Upgrade an HTTP request to a `WebSocket` subscriber connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_events(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.is_at_capacity().await {
        warn!("WebSocket connection refused, subscriber limit reached");
        return ObserverError::AtCapacity.into_response();
    }
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Admit the subscriber, stream events until either side goes away, then
/// deregister.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let subscription = match state.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "WebSocket subscriber rejected");
            let frame = CloseFrame {
                code: close_code::AGAIN,
                reason: Utf8Bytes::from_static("Server at capacity"),
            };
            if socket.send(Message::Close(Some(frame))).await.is_err() {
                debug!("WebSocket client gone before close frame");
            }
            return;
        }
    };

    let id = subscription.id;
    info!(subscriber = %id, "WebSocket subscriber admitted");

    stream_events(&mut socket, subscription).await;

    state.unsubscribe(id).await;
    info!(subscriber = %id, "WebSocket subscriber disconnected");
}

/// Send the initial snapshot, then forward broadcasts until the client
/// disconnects or the channel closes.
async fn stream_events(socket: &mut WebSocket, subscription: Subscription) {
    let Subscription {
        id,
        initial,
        mut rx,
    } = subscription;

    if !send_event(socket, &initial).await {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(socket, &event).await {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(subscriber = %id, skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "WebSocket pong failed");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Subscribers have nothing to say.
                    }
                }
            }
        }
    }
}

/// Serialize and send one event. Returns `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &MeshEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(event = event.name(), "Failed to serialize event: {e}");
            return true;
        }
    };
    if socket.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket client disconnected (send failed)");
        return false;
    }
    true
}
