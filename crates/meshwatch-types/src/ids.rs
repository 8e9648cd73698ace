//! Identifier types for mesh nodes and stored messages.
//!
//! Node identifiers are opaque strings chosen by the upstream monitor
//! (a hex id such as `0x9e7595c4` or a configured long name). Message
//! identifiers are UUID v7 values assigned when a message enters the
//! history so that administrative deletes can address it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Opaque identifier of a mesh participant.
///
/// The core never interprets the contents. An empty identifier is treated
/// the same as a missing one (see [`NodeId::from_text`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct NodeId(pub String);

impl NodeId {
    /// Build a node id from free text, returning `None` when the trimmed
    /// text is empty.
    pub fn from_text(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique identifier for a message held in the history ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl core::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Uuid>().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_node_text_is_none() {
        assert!(NodeId::from_text("   ").is_none());
        assert_eq!(NodeId::from_text(" 0x9e7595c4 "), Some(NodeId::from("0x9e7595c4")));
    }

    #[test]
    fn message_id_round_trips_through_text() {
        let id = MessageId::new();
        let parsed: MessageId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn node_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&NodeId::from("Node Echo")).unwrap();
        assert_eq!(json, "\"Node Echo\"");
    }
}
