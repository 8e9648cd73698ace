//! Reasons a record is turned away by the update routine.
//!
//! None of these are faults. Noisy upstream text and partially filled
//! submissions are normal, so a [`Rejection`] is logged at `debug` and
//! counted, and processing carries on with the next record.

use meshwatch_types::RecordKind;

/// Why a record or submitted item was not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// A submitted item had no `type`.
    #[error("item has no type")]
    MissingType,

    /// A submitted item had no `data`.
    #[error("item has no data")]
    MissingData,

    /// The record type tag was not one of the known kinds.
    #[error("unrecognised record type: {0}")]
    UnknownType(String),

    /// The `data` payload did not fit the record kind.
    #[error("invalid {kind} data: {reason}")]
    InvalidData {
        /// The kind the item claimed to be.
        kind: RecordKind,
        /// Deserialisation failure.
        reason: String,
    },

    /// A position without two finite coordinates.
    #[error("position has no finite coordinates")]
    InvalidCoordinates,

    /// A message without text.
    #[error("message has no body")]
    MissingBody,

    /// A position or telemetry record without a sender.
    #[error("{0} record has no node id")]
    MissingNode(RecordKind),
}
