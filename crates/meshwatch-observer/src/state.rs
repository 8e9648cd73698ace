//! Shared application state: the broadcast hub.
//!
//! [`AppState`] owns the [`MeshState`] and the [`SubscriberRegistry`]
//! behind one [`Mutex`], plus the broadcast channel that carries
//! [`MeshEvent`]s to every connected `WebSocket` subscriber.
//!
//! All mutations go through this type. Each one publishes its event
//! before releasing the lock, and [`AppState::subscribe`] takes its
//! snapshot and its receiver under the same lock. That makes updates and
//! admissions totally ordered: an event is either part of a subscriber's
//! `initial-data` or delivered to it live, never both and never neither.

use std::time::{Duration, Instant};

use meshwatch_core::config::ServerSettings;
use meshwatch_core::{
    AdmissionError, BatchReport, DeleteOutcome, MeshState, MeshwatchConfig, NodeAliases,
    Rejection, StateSnapshot, SubscriberId, SubscriberRegistry, record_from_item,
};
use meshwatch_types::{IngressItem, MeshEvent, MessageId, Record};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

/// Capacity of the broadcast channel for mesh events.
///
/// If a subscriber falls behind by more than this many events it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest event.
const BROADCAST_CAPACITY: usize = 256;

/// Everything guarded by the hub lock.
#[derive(Debug)]
struct HubInner {
    mesh: MeshState,
    subscribers: SubscriberRegistry,
}

/// An admitted subscriber.
#[derive(Debug)]
pub struct Subscription {
    /// Registry handle; pass to [`AppState::unsubscribe`] on disconnect.
    pub id: SubscriberId,
    /// The `initial-data` event to send before anything else.
    pub initial: MeshEvent,
    /// Live events published after the snapshot was taken.
    pub rx: broadcast::Receiver<MeshEvent>,
}

/// Counts served by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HubStats {
    /// Seconds since the hub was created.
    pub uptime: f64,
    /// Active subscribers.
    pub connections: usize,
    /// Messages in the history.
    pub messages: usize,
    /// Nodes with a known position.
    pub nodes: usize,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`std::sync::Arc`] and injected via Axum's `State`
/// extractor.
#[derive(Debug)]
pub struct AppState {
    inner: Mutex<HubInner>,
    tx: broadcast::Sender<MeshEvent>,
    started_at: Instant,
    aliases: NodeAliases,
    /// Bind address, CORS origins and body limit for the HTTP layer.
    pub server: ServerSettings,
}

impl AppState {
    /// Create a hub with the default limits.
    pub fn new() -> Self {
        Self::from_config(&MeshwatchConfig::default())
    }

    /// Create a hub sized and labelled from configuration.
    pub fn from_config(config: &MeshwatchConfig) -> Self {
        let capacity = if config.limits.broadcast_capacity == 0 {
            BROADCAST_CAPACITY
        } else {
            config.limits.broadcast_capacity
        };
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Mutex::new(HubInner {
                mesh: MeshState::new(config.limits.max_messages),
                subscribers: SubscriberRegistry::with_capacity(config.limits.max_subscribers),
            }),
            tx,
            started_at: Instant::now(),
            aliases: config.node_aliases.clone(),
            server: config.server.clone(),
        }
    }

    /// Display names for log output.
    pub const fn aliases(&self) -> &NodeAliases {
        &self.aliases
    }

    /// Apply one record and publish the resulting event.
    ///
    /// Returns the event that was broadcast.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when the record is not usable; nothing is
    /// published in that case.
    pub async fn ingest(&self, record: Record) -> Result<MeshEvent, Rejection> {
        let mut inner = self.inner.lock().await;
        let event = inner.mesh.apply(record)?;
        self.publish(event.clone());
        Ok(event)
    }

    /// Convert and apply one structured `{type, data}` item.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when the item is malformed or not usable.
    pub async fn ingest_item(&self, item: IngressItem) -> Result<MeshEvent, Rejection> {
        let record = record_from_item(item)?;
        self.ingest(record).await
    }

    /// Apply a batch of structured items in order.
    ///
    /// Malformed items are counted and skipped; the rest of the batch is
    /// still applied. The whole batch is applied under one lock so it is
    /// never interleaved with other updates.
    pub async fn ingest_batch(&self, items: Vec<serde_json::Value>) -> BatchReport {
        let mut report = BatchReport::new();
        let mut inner = self.inner.lock().await;

        for (index, value) in items.into_iter().enumerate() {
            let applied = record_from_item(IngressItem::from_value(value)).and_then(|record| {
                let kind = record.kind();
                let node = record.node_id().cloned();
                inner.mesh.apply(record).map(|event| (kind, node, event))
            });
            match applied {
                Ok((kind, node, event)) => {
                    report.accept(kind, node.as_ref());
                    self.publish(event);
                }
                Err(reason) => {
                    debug!(index, %reason, "Batch item rejected");
                    report.reject();
                }
            }
        }
        drop(inner);

        if report.total() > 0 {
            info!(
                rejected = report.rejected,
                "Batch applied: {}",
                report.summary(&self.aliases)
            );
        }
        report
    }

    /// Admit a new subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::AtCapacity`] when the subscriber limit is
    /// reached. The registry is unchanged and no snapshot is produced.
    pub async fn subscribe(&self) -> Result<Subscription, AdmissionError> {
        let mut inner = self.inner.lock().await;
        let id = inner.subscribers.admit()?;
        let initial = MeshEvent::InitialData(inner.mesh.initial_data());
        let rx = self.tx.subscribe();
        Ok(Subscription { id, initial, rx })
    }

    /// Deregister a subscriber. Returns `false` if it was not registered.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.lock().await.subscribers.release(id)
    }

    /// Whether a new subscriber would currently be turned away.
    pub async fn is_at_capacity(&self) -> bool {
        self.inner.lock().await.subscribers.is_full()
    }

    /// Delete one message and publish `message-deleted` if it existed.
    pub async fn delete_message(&self, id: MessageId) -> DeleteOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.mesh.delete_message(id);
        if let DeleteOutcome::Deleted(event) = &outcome {
            self.publish(event.clone());
        }
        outcome
    }

    /// Clear all state and publish `all-cleared`. Returns the number of
    /// entries removed.
    pub async fn clear_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let cleared = inner.mesh.clear_all();
        self.publish(MeshEvent::AllCleared);
        cleared
    }

    /// Enriched view of messages, positions and telemetry.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().await.mesh.snapshot()
    }

    /// Counts for the health endpoint.
    pub async fn stats(&self) -> HubStats {
        let inner = self.inner.lock().await;
        let counts = inner.mesh.counts();
        HubStats {
            uptime: self.uptime().as_secs_f64(),
            connections: inner.subscribers.len(),
            messages: counts.messages,
            nodes: counts.nodes,
        }
    }

    /// Time since the hub was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Send an event to every live receiver. Callers hold the hub lock.
    fn publish(&self, event: MeshEvent) -> usize {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        let name = event.name();
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(event = name, receivers, "Event published");
        receivers
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
