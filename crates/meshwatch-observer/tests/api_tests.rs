//! Integration tests for the observer API endpoints and the broadcast hub.
//!
//! HTTP tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Subscriber behaviour is exercised through the
//! hub's subscribe/publish API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use meshwatch_observer::router::build_router;
use meshwatch_observer::state::AppState;
use meshwatch_types::{MeshEvent, MessageRecord, NodeId, Record};
use serde_json::{Value, json};
use tower::ServiceExt;

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(state: &Arc<AppState>, path: &str) -> (StatusCode, Value) {
    send(state, Request::get(path).body(Body::empty()).unwrap()).await
}

fn text_message(body: &str, node: &str) -> Record {
    Record::Message(MessageRecord {
        node_id: Some(NodeId::from(node)),
        body: Some(body.to_owned()),
        ..MessageRecord::empty(String::from("2024-01-01T00:00:00Z"))
    })
}

// =========================================================================
// Structured ingress
// =========================================================================

#[tokio::test]
async fn test_batch_counts_processed_and_rejected() {
    let state = Arc::new(AppState::new());
    let batch = json!({
        "messages": [
            { "type": "message", "data": { "from": "!a1", "message": "hello mesh" } },
            { "type": "position", "data": { "nodeId": "!a1", "latitude": 37.1, "longitude": -122.2 } },
            { "type": "telemetry", "data": { "nodeId": "!a1", "battery": "80%", "voltage": "4.1V" } },
            { "data": { "nodeId": "!a1" } },
            { "type": "message" },
            { "type": "routing", "data": { "nodeId": "!a1" } },
            { "type": "position", "data": { "nodeId": "!a1", "location": "north,-122.2" } }
        ]
    });

    let (status, json) = send(&state, post_json("/api/messages/batch", &batch)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["processed"]["messages"], 1);
    assert_eq!(json["processed"]["positions"], 1);
    assert_eq!(json["processed"]["telemetry"], 1);
    assert_eq!(json["rejected"], 4);
}

#[tokio::test]
async fn test_batch_with_wrong_shape_is_rejected() {
    let state = Arc::new(AppState::new());

    for body in [json!({ "records": [] }), json!({ "messages": "nope" }), json!([1, 2])] {
        let (status, json) = send(&state, post_json("/api/messages/batch", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid batch format");
        assert_eq!(json["status"], 400);
    }
}

#[tokio::test]
async fn test_batch_with_invalid_json_is_rejected() {
    let state = Arc::new(AppState::new());
    let request = Request::post("/api/messages/batch")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, json) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid batch format");
}

#[tokio::test]
async fn test_single_record_submission() {
    let state = Arc::new(AppState::new());
    let item = json!({ "type": "message", "data": { "nodeId": "!b2", "body": "single" } });

    let (status, json) = send(&state, post_json("/api/messages", &item)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["event"], "new-message");

    let (_, snapshot) = get(&state, "/api/snapshot").await;
    assert_eq!(snapshot["messages"][0]["body"], "single");
    assert_eq!(snapshot["messages"][0]["nodeId"], "!b2");
}

#[tokio::test]
async fn test_single_record_without_type_is_bad_request() {
    let state = Arc::new(AppState::new());
    let item = json!({ "data": { "nodeId": "!b2", "body": "single" } });

    let (status, json) = send(&state, post_json("/api/messages", &item)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_telemetry_battery_enriches_position_snapshot() {
    let state = Arc::new(AppState::new());
    let batch = json!({
        "messages": [
            { "type": "telemetry", "data": { "nodeId": "X", "battery": "80%" } },
            { "type": "position", "data": { "nodeId": "X", "lat": "37.1", "lng": "-122.2" } }
        ]
    });
    send(&state, post_json("/api/messages/batch", &batch)).await;

    let (_, snapshot) = get(&state, "/api/snapshot").await;
    assert_eq!(snapshot["positions"][0]["battery"], "80%");
    assert_eq!(snapshot["telemetry"][0]["battery"], "80%");
}

#[tokio::test]
async fn test_history_keeps_newest_fifty() {
    let state = Arc::new(AppState::new());
    let items: Vec<Value> = (0..51)
        .map(|i| json!({ "type": "message", "data": { "nodeId": "!c3", "body": format!("m{i}") } }))
        .collect();
    send(&state, post_json("/api/messages/batch", &json!({ "messages": items }))).await;

    let (_, snapshot) = get(&state, "/api/snapshot").await;
    let messages = snapshot["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 50);
    assert_eq!(messages[0]["body"], "m1");
    assert_eq!(messages[49]["body"], "m50");
}

// =========================================================================
// Administration
// =========================================================================

#[tokio::test]
async fn test_delete_existing_message() {
    let state = Arc::new(AppState::new());
    let MeshEvent::NewMessage(stored) = state.ingest(text_message("bye", "!d4")).await.unwrap()
    else {
        panic!("expected new-message");
    };
    let id = stored.id.unwrap().to_string();

    let (status, json) = send(
        &state,
        post_json("/api/messages/delete", &json!({ "messageId": id })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["deleted"], id);
    assert_eq!(state.stats().await.messages, 0);
}

#[tokio::test]
async fn test_delete_unknown_message_is_not_found_and_changes_nothing() {
    let state = Arc::new(AppState::new());
    state.ingest(text_message("one", "!d4")).await.unwrap();
    state.ingest(text_message("two", "!d4")).await.unwrap();
    let before = state.snapshot().await;

    for id in [
        json!("0190f0e4-0000-7000-8000-000000000000"),
        json!("not-an-id"),
        json!(42),
    ] {
        let (status, json) =
            send(&state, post_json("/api/messages/delete", &json!({ "messageId": id }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Message not found");
    }

    assert_eq!(state.snapshot().await, before);
}

#[tokio::test]
async fn test_delete_without_id_is_bad_request() {
    let state = Arc::new(AppState::new());
    let (status, _) = send(&state, post_json("/api/messages/delete", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_then_snapshot_is_empty() {
    let state = Arc::new(AppState::new());
    let batch = json!({
        "messages": [
            { "type": "message", "data": { "nodeId": "!e5", "body": "hi" } },
            { "type": "position", "data": { "nodeId": "!e5", "latitude": 1.5, "longitude": 2.5 } },
            { "type": "telemetry", "data": { "nodeId": "!e5", "battery": "50%" } }
        ]
    });
    send(&state, post_json("/api/messages/batch", &batch)).await;

    let (status, json) = send(
        &state,
        Request::post("/api/messages/clear").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 3);

    let (_, snapshot) = get(&state, "/api/snapshot").await;
    assert_eq!(snapshot["messages"].as_array().unwrap().len(), 0);
    assert_eq!(snapshot["positions"].as_array().unwrap().len(), 0);
    assert_eq!(snapshot["telemetry"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_health_reports_counts() {
    let state = Arc::new(AppState::new());
    state.ingest(text_message("hi", "!f6")).await.unwrap();
    let _subscription = state.subscribe().await.unwrap();

    let (status, json) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connections"], 1);
    assert_eq!(json["messages"], 1);
    assert_eq!(json["nodes"], 0);
    assert!(json["uptime"].is_number());
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let state = Arc::new(AppState::new());
    let (status, _) = get(&state, "/api/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =========================================================================
// Broadcast hub
// =========================================================================

#[tokio::test]
async fn test_subscriber_gets_initial_data_then_live_events() {
    let state = Arc::new(AppState::new());
    state.ingest(text_message("before", "!g7")).await.unwrap();

    let mut subscription = state.subscribe().await.unwrap();
    match &subscription.initial {
        MeshEvent::InitialData(data) => {
            assert_eq!(data.messages.len(), 1);
            assert_eq!(data.messages[0].body.as_deref(), Some("before"));
        }
        other => panic!("unexpected {other:?}"),
    }

    state.ingest(text_message("after", "!g7")).await.unwrap();
    state.clear_all().await;

    match subscription.rx.recv().await.unwrap() {
        MeshEvent::NewMessage(m) => assert_eq!(m.body.as_deref(), Some("after")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(subscription.rx.recv().await.unwrap(), MeshEvent::AllCleared);
}

#[tokio::test]
async fn test_rejected_items_are_not_broadcast() {
    let state = Arc::new(AppState::new());
    let mut subscription = state.subscribe().await.unwrap();

    let report = state
        .ingest_batch(vec![
            json!({ "type": "message", "data": { "nodeId": "!h8" } }),
            json!({ "type": "telemetry", "data": { "nodeId": "!h8", "voltage": "3.9V" } }),
        ])
        .await;
    assert_eq!(report.rejected, 1);

    assert!(matches!(
        subscription.rx.recv().await.unwrap(),
        MeshEvent::TelemetryUpdate(_)
    ));
    assert!(subscription.rx.try_recv().is_err());
}

#[tokio::test]
async fn test_subscriber_limit_rejects_the_101st() {
    let state = Arc::new(AppState::new());
    let mut admitted = Vec::new();
    for _ in 0..100 {
        admitted.push(state.subscribe().await.unwrap());
    }
    assert!(state.is_at_capacity().await);

    assert!(state.subscribe().await.is_err());
    assert_eq!(state.stats().await.connections, 100);

    let released = admitted.pop().unwrap();
    assert!(state.unsubscribe(released.id).await);
    assert!(state.subscribe().await.is_ok());
    assert_eq!(state.stats().await.connections, 100);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let state = Arc::new(AppState::new());
    let subscription = state.subscribe().await.unwrap();

    assert!(state.unsubscribe(subscription.id).await);
    assert!(!state.unsubscribe(subscription.id).await);
    assert_eq!(state.stats().await.connections, 0);
}
