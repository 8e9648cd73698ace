//! Wire shapes for the structured ingress.
//!
//! A remote agent that talks to the radio directly can submit records as
//! JSON instead of having them scraped from text. Each item names its
//! record type and carries the fields in `data`. Both fields are optional
//! at this layer so that a malformed item can be rejected on its own
//! without failing the batch it arrived in.

use serde::{Deserialize, Serialize};

/// One submitted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressItem {
    /// Record type tag (`message`, `position` or `telemetry`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Record fields.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// An ordered batch of submitted records.
///
/// Items stay as raw JSON until each is decoded on its own, so one item
/// of the wrong shape does not reject its neighbours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmission {
    /// The items, processed in order.
    pub messages: Vec<serde_json::Value>,
}

impl IngressItem {
    /// Decode one raw batch entry. Entries that are not objects decode to
    /// an item with neither `type` nor `data`.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}
