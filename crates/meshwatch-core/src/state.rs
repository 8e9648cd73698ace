//! The shared update routine and the state it owns.
//!
//! [`MeshState`] is the single owner of the node store and the message
//! history. Both ingress paths (parsed text and structured submissions)
//! converge on [`MeshState::apply`], which folds a record into the state
//! and returns the event to broadcast. The caller is responsible for
//! serialising access (see the hub in `meshwatch-observer`); nothing in
//! here blocks or performs I/O.

use meshwatch_types::{
    InitialData, MeshEvent, MessageDeleted, MessageId, MessageRecord, PositionRecord, Record,
    RecordKind, TelemetryRecord,
};
use serde::Serialize;

use crate::error::Rejection;
use crate::history::{HistoryRing, MAX_MESSAGES};
use crate::store::NodeStore;

/// Result of deleting a message by id.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The message was removed; the event to broadcast is included.
    Deleted(MeshEvent),
    /// No message with that id is stored. Nothing changed.
    NotFound,
}

/// Read-only view of the whole state, enriched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Message history, oldest first.
    pub messages: Vec<MessageRecord>,
    /// Latest position per node.
    pub positions: Vec<PositionRecord>,
    /// Latest telemetry per node.
    pub telemetry: Vec<TelemetryRecord>,
}

/// Counts for health and introspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    /// Messages in the history.
    pub messages: usize,
    /// Nodes with a known position.
    pub nodes: usize,
    /// Nodes with a telemetry snapshot.
    pub telemetry: usize,
}

/// Node store plus message history.
#[derive(Debug, Clone)]
pub struct MeshState {
    nodes: NodeStore,
    history: HistoryRing,
}

impl MeshState {
    /// Create an empty state keeping at most `max_messages` messages.
    pub fn new(max_messages: usize) -> Self {
        Self {
            nodes: NodeStore::new(),
            history: HistoryRing::with_capacity(max_messages),
        }
    }

    /// Fold a record into the state and return the event to broadcast.
    ///
    /// Messages need a body, positions and telemetry need a sender.
    /// Broadcast payloads are enriched copies; the stored records keep the
    /// values they arrived with.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the record is not usable. The state is
    /// unchanged in that case.
    pub fn apply(&mut self, record: Record) -> Result<MeshEvent, Rejection> {
        match record {
            Record::Message(message) => self.apply_message(message),
            Record::Position(position) => self.apply_position(position),
            Record::Telemetry(telemetry) => self.apply_telemetry(telemetry),
            Record::Unknown(unknown) => Err(Rejection::UnknownType(unknown.type_name)),
        }
    }

    fn apply_message(&mut self, mut message: MessageRecord) -> Result<MeshEvent, Rejection> {
        if message.body.as_deref().is_none_or(|b| b.trim().is_empty()) {
            return Err(Rejection::MissingBody);
        }
        let id = *message.id.get_or_insert_with(MessageId::new);
        let enriched = self.nodes.enrich_message(&message);
        if let Some(evicted) = self.history.append(message) {
            tracing::trace!(evicted = ?evicted.id, kept = %id, "History full, oldest message evicted");
        }
        Ok(MeshEvent::NewMessage(enriched))
    }

    fn apply_position(&mut self, position: PositionRecord) -> Result<MeshEvent, Rejection> {
        let node = position
            .node_id
            .clone()
            .filter(|n| !n.is_blank())
            .ok_or(Rejection::MissingNode(RecordKind::Position))?;
        let enriched = self.nodes.enrich_position(&position);
        self.nodes.update_position(node, position);
        Ok(MeshEvent::PositionUpdate(enriched))
    }

    fn apply_telemetry(&mut self, telemetry: TelemetryRecord) -> Result<MeshEvent, Rejection> {
        let node = telemetry
            .node_id
            .clone()
            .filter(|n| !n.is_blank())
            .ok_or(Rejection::MissingNode(RecordKind::Telemetry))?;
        let event = MeshEvent::TelemetryUpdate(telemetry.clone());
        self.nodes.update_telemetry(node, telemetry);
        Ok(event)
    }

    /// The snapshot a newly admitted subscriber receives.
    pub fn initial_data(&self) -> InitialData {
        InitialData {
            messages: self
                .history
                .iter()
                .map(|m| self.nodes.enrich_message(m))
                .collect(),
            positions: self.nodes.enriched_positions(),
        }
    }

    /// Enriched view of everything, including telemetry.
    pub fn snapshot(&self) -> StateSnapshot {
        let InitialData {
            messages,
            positions,
        } = self.initial_data();
        StateSnapshot {
            messages,
            positions,
            telemetry: self.nodes.telemetry_snapshots(),
        }
    }

    /// Remove a message from the history.
    pub fn delete_message(&mut self, id: MessageId) -> DeleteOutcome {
        match self.history.delete_by_id(id) {
            Some(_) => DeleteOutcome::Deleted(MeshEvent::MessageDeleted(MessageDeleted {
                message_id: id,
            })),
            None => DeleteOutcome::NotFound,
        }
    }

    /// Drop all messages, positions and telemetry. Returns the combined
    /// number of entries removed.
    pub fn clear_all(&mut self) -> usize {
        self.history.clear().saturating_add(self.nodes.clear())
    }

    /// Current counts.
    pub fn counts(&self) -> StateCounts {
        StateCounts {
            messages: self.history.len(),
            nodes: self.nodes.position_count(),
            telemetry: self.nodes.telemetry_count(),
        }
    }

    /// The node store.
    pub const fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// The message history.
    pub const fn history(&self) -> &HistoryRing {
        &self.history
    }
}

impl Default for MeshState {
    fn default() -> Self {
        Self::new(MAX_MESSAGES)
    }
}
