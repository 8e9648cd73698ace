//! Events pushed to dashboard subscribers.
//!
//! Every event is serialised as an envelope `{"event": <name>, "data": ...}`
//! so a single `WebSocket` text frame carries both the event name and its
//! payload. `all-cleared` carries no payload.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::MessageId;
use crate::record::{MessageRecord, PositionRecord, TelemetryRecord};

/// An egress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum MeshEvent {
    /// A message was added to the history (enriched copy).
    NewMessage(MessageRecord),
    /// A node reported a new position (enriched copy).
    PositionUpdate(PositionRecord),
    /// A node reported new telemetry.
    TelemetryUpdate(TelemetryRecord),
    /// A message was removed by an operator.
    MessageDeleted(MessageDeleted),
    /// All stored state was dropped by an operator.
    AllCleared,
    /// Snapshot sent once to a newly admitted subscriber.
    InitialData(InitialData),
}

impl MeshEvent {
    /// The event name as seen by subscribers.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new-message",
            Self::PositionUpdate(_) => "position-update",
            Self::TelemetryUpdate(_) => "telemetry-update",
            Self::MessageDeleted(_) => "message-deleted",
            Self::AllCleared => "all-cleared",
            Self::InitialData(_) => "initial-data",
        }
    }
}

/// Payload of `message-deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MessageDeleted {
    /// The removed message.
    pub message_id: MessageId,
}

/// Payload of `initial-data`: the enriched history and latest positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InitialData {
    /// Message history, oldest first.
    pub messages: Vec<MessageRecord>,
    /// Latest position per node.
    pub positions: Vec<PositionRecord>,
}
