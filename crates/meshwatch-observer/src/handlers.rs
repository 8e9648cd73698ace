//! REST endpoint handlers for the observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/messages/batch` | Apply `{"messages": [{type, data}, ...]}` in order |
//! | `POST` | `/api/messages` | Apply a single `{type, data}` item |
//! | `POST` | `/api/messages/delete` | Delete one message by `messageId` |
//! | `POST` | `/api/messages/clear` | Clear messages, positions and telemetry |
//! | `GET` | `/api/snapshot` | Enriched messages, positions and telemetry |
//! | `GET` | `/health` | Uptime and counts |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meshwatch_core::{DeleteOutcome, ProcessedCounts};
use meshwatch_types::{BatchSubmission, IngressItem, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ObserverError;
use crate::state::AppState;

/// Response body for a batch submission.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// Always `true`; a malformed batch is an error response instead.
    pub success: bool,
    /// Applied records per kind.
    pub processed: ProcessedCounts,
    /// Items that were skipped.
    pub rejected: usize,
}

/// Request body for deleting one message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    /// Id of the message to remove.
    pub message_id: Option<Value>,
}

// ---------------------------------------------------------------------------
// POST /api/messages/batch
// ---------------------------------------------------------------------------

/// Apply an ordered batch of structured records.
///
/// Items missing `type` or `data`, or carrying unusable data, are counted
/// as rejected without aborting the rest of the batch.
pub async fn post_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(payload) = payload.map_err(|e| {
        debug!("Batch body rejected: {e}");
        ObserverError::InvalidBatch
    })?;
    let batch: BatchSubmission = serde_json::from_value(payload).map_err(|e| {
        debug!("Batch body rejected: {e}");
        ObserverError::InvalidBatch
    })?;

    let report = state.ingest_batch(batch.messages).await;

    Ok(Json(BatchResponse {
        success: true,
        processed: report.processed,
        rejected: report.rejected,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/messages
// ---------------------------------------------------------------------------

/// Apply a single structured record.
pub async fn post_record(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(payload) = payload.map_err(|e| ObserverError::BadRequest(e.body_text()))?;

    let event = state.ingest_item(IngressItem::from_value(payload)).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "event": event.name(),
    })))
}

// ---------------------------------------------------------------------------
// POST /api/messages/delete
// ---------------------------------------------------------------------------

/// Delete one message from the history.
///
/// An id that is not a valid message id cannot match anything and is
/// reported as not found.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Response, ObserverError> {
    let Json(request) = payload.map_err(|e| ObserverError::BadRequest(e.body_text()))?;

    let raw = match request.message_id {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Null) | None => {
            return Err(ObserverError::BadRequest(String::from(
                "messageId is required",
            )));
        }
        Some(Value::String(_)) => {
            return Err(ObserverError::BadRequest(String::from(
                "messageId must not be empty",
            )));
        }
        Some(other) => other.to_string(),
    };

    let outcome = match raw.parse::<MessageId>() {
        Ok(id) => state.delete_message(id).await,
        Err(_) => DeleteOutcome::NotFound,
    };

    let response = match outcome {
        DeleteOutcome::Deleted(_) => Json(serde_json::json!({
            "success": true,
            "deleted": raw.trim(),
        }))
        .into_response(),
        DeleteOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "message": "Message not found",
            })),
        )
            .into_response(),
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// POST /api/messages/clear
// ---------------------------------------------------------------------------

/// Drop every message, position and telemetry snapshot.
pub async fn clear_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cleared = state.clear_all().await;
    Json(serde_json::json!({
        "success": true,
        "cleared": cleared,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/snapshot
// ---------------------------------------------------------------------------

/// Return the enriched view of all state.
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot().await)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report uptime, subscriber count, stored messages and known nodes.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "uptime": stats.uptime,
        "connections": stats.connections,
        "messages": stats.messages,
        "nodes": stats.nodes,
    }))
}
