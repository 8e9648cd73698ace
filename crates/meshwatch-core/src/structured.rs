//! Structured ingress: submitted `{type, data}` items to records.
//!
//! Items bypass the text parser and are converted straight into
//! [`Record`]s, which then go through the same update routine as parsed
//! records. A bad item is rejected on its own; the rest of its batch is
//! still processed. Unrecognised type tags become [`Record::Unknown`]
//! instead of being routed to a guessed kind.

use std::collections::{BTreeMap, BTreeSet};

use meshwatch_types::record::lenient;
use meshwatch_types::{
    IngressItem, MessageRecord, NodeId, PositionRecord, Record, RecordKind, TelemetryRecord,
    UnknownRecord, now_timestamp,
};
use serde::{Deserialize, Serialize};

use crate::config::NodeAliases;
use crate::error::Rejection;

/// Position payload as submitted. Coordinates may arrive as separate
/// numbers or as the monitor's `"lat, lng"` string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionPayload {
    #[serde(default = "now_timestamp")]
    timestamp: String,
    #[serde(default, alias = "from", deserialize_with = "lenient::option_node")]
    node_id: Option<NodeId>,
    #[serde(default, alias = "lat", deserialize_with = "lenient::option_number")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", deserialize_with = "lenient::option_number")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_text")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_text")]
    altitude: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_text")]
    battery: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_text")]
    rssi: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_text")]
    snr: Option<String>,
}

impl PositionPayload {
    fn into_record(self) -> Result<PositionRecord, Rejection> {
        let coordinates = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => self
                .location
                .as_deref()
                .and_then(PositionRecord::parse_coordinates),
        };
        let (latitude, longitude) = coordinates.ok_or(Rejection::InvalidCoordinates)?;
        Ok(PositionRecord {
            timestamp: self.timestamp,
            node_id: self.node_id,
            latitude,
            longitude,
            altitude: self.altitude,
            battery: self.battery,
            rssi: self.rssi,
            snr: self.snr,
        })
    }
}

fn invalid(kind: RecordKind, err: &serde_json::Error) -> Rejection {
    Rejection::InvalidData {
        kind,
        reason: err.to_string(),
    }
}

/// Convert one submitted item into a record.
///
/// # Errors
///
/// Returns a [`Rejection`] when the item has no type or data, or when the
/// data does not fit the named kind.
pub fn record_from_item(item: IngressItem) -> Result<Record, Rejection> {
    let kind = item
        .kind
        .map(|k| k.trim().to_owned())
        .filter(|k| !k.is_empty())
        .ok_or(Rejection::MissingType)?;
    let data = item
        .data
        .filter(|d| !d.is_null())
        .ok_or(Rejection::MissingData)?;

    match kind.as_str() {
        "message" => serde_json::from_value::<MessageRecord>(data)
            .map(Record::Message)
            .map_err(|e| invalid(RecordKind::Message, &e)),
        "position" => serde_json::from_value::<PositionPayload>(data)
            .map_err(|e| invalid(RecordKind::Position, &e))?
            .into_record()
            .map(Record::Position),
        "telemetry" => serde_json::from_value::<TelemetryRecord>(data)
            .map(Record::Telemetry)
            .map_err(|e| invalid(RecordKind::Telemetry, &e)),
        _ => {
            let node_id = data
                .get("nodeId")
                .or_else(|| data.get("from"))
                .and_then(serde_json::Value::as_str)
                .and_then(NodeId::from_text);
            let timestamp = data
                .get("timestamp")
                .and_then(serde_json::Value::as_str)
                .map_or_else(now_timestamp, str::to_owned);
            Ok(Record::Unknown(UnknownRecord {
                type_name: kind,
                timestamp,
                node_id,
            }))
        }
    }
}

/// Per-kind counts of applied records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedCounts {
    /// Messages added to the history.
    pub messages: usize,
    /// Position updates stored.
    pub positions: usize,
    /// Telemetry updates stored.
    pub telemetry: usize,
}

/// Outcome of one structured submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Applied records per kind.
    pub processed: ProcessedCounts,
    /// Items that were turned away.
    pub rejected: usize,
    nodes: BTreeMap<RecordKind, BTreeSet<NodeId>>,
}

impl BatchReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an applied record.
    pub fn accept(&mut self, kind: RecordKind, node: Option<&NodeId>) {
        let counter = match kind {
            RecordKind::Message => &mut self.processed.messages,
            RecordKind::Position => &mut self.processed.positions,
            RecordKind::Telemetry => &mut self.processed.telemetry,
            RecordKind::Unknown => return,
        };
        *counter = counter.saturating_add(1);
        if let Some(node) = node {
            self.nodes.entry(kind).or_default().insert(node.clone());
        }
    }

    /// Count a rejected item.
    pub const fn reject(&mut self) {
        self.rejected = self.rejected.saturating_add(1);
    }

    /// Total applied records.
    pub const fn total(&self) -> usize {
        self.processed
            .messages
            .saturating_add(self.processed.positions)
            .saturating_add(self.processed.telemetry)
    }

    /// One-line summary such as `2 msg (Node Echo), 1 telem (0x9e7595c4)`.
    pub fn summary(&self, aliases: &NodeAliases) -> String {
        let parts: Vec<String> = [
            (RecordKind::Message, self.processed.messages, "msg"),
            (RecordKind::Position, self.processed.positions, "pos"),
            (RecordKind::Telemetry, self.processed.telemetry, "telem"),
        ]
        .into_iter()
        .filter(|(_, count, _)| *count > 0)
        .map(|(kind, count, label)| {
            let names: Vec<&str> = self
                .nodes
                .get(&kind)
                .into_iter()
                .flatten()
                .map(|n| aliases.display_name(n))
                .collect();
            format!("{count} {label} ({})", names.join(", "))
        })
        .collect();

        if parts.is_empty() {
            String::from("no data")
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use meshwatch_types::MessageId;
    use serde_json::json;

    use super::*;
    use crate::state::MeshState;

    fn item(kind: Option<&str>, data: Option<serde_json::Value>) -> IngressItem {
        IngressItem {
            kind: kind.map(str::to_owned),
            data,
        }
    }

    #[test]
    fn message_item_with_legacy_names() {
        let record = record_from_item(item(
            Some("message"),
            Some(json!({"from": "Node Echo", "message": "hi", "timestamp": "2024-01-01 00:00:00"})),
        ))
        .unwrap();
        match record {
            Record::Message(m) => {
                assert_eq!(m.node_id, Some(NodeId::from("Node Echo")));
                assert_eq!(m.body.as_deref(), Some("hi"));
                assert_eq!(m.timestamp, "2024-01-01 00:00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn position_item_from_location_string() {
        let record = record_from_item(item(
            Some("position"),
            Some(json!({"from": "X", "location": "37.100000, -122.200000", "altitude": "12m"})),
        ))
        .unwrap();
        match record {
            Record::Position(p) => {
                assert!((p.latitude - 37.1).abs() < 1e-9);
                assert!((p.longitude + 122.2).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn position_item_from_numbers() {
        let record = record_from_item(item(
            Some("position"),
            Some(json!({"nodeId": "X", "lat": 1.5, "lng": "2.5"})),
        ))
        .unwrap();
        assert!(matches!(record, Record::Position(_)));
    }

    #[test]
    fn position_item_without_coordinates_is_rejected() {
        let result = record_from_item(item(
            Some("position"),
            Some(json!({"from": "X", "location": "nowhere"})),
        ));
        assert_eq!(result, Err(Rejection::InvalidCoordinates));
    }

    #[test]
    fn missing_type_or_data() {
        assert_eq!(
            record_from_item(item(None, Some(json!({})))),
            Err(Rejection::MissingType)
        );
        assert_eq!(
            record_from_item(item(Some("message"), None)),
            Err(Rejection::MissingData)
        );
    }

    #[test]
    fn wrong_shaped_data_is_rejected() {
        let result = record_from_item(item(Some("message"), Some(json!("just text"))));
        assert!(matches!(
            result,
            Err(Rejection::InvalidData {
                kind: RecordKind::Message,
                ..
            })
        ));
    }

    #[test]
    fn message_with_unusable_id_is_kept_without_one() {
        for id in [json!("msg-1"), json!(7), json!({"nested": true})] {
            let record = record_from_item(item(
                Some("message"),
                Some(json!({"id": id, "from": "X", "message": "hi"})),
            ))
            .unwrap();
            match record {
                Record::Message(m) => {
                    assert_eq!(m.id, None);
                    assert_eq!(m.body.as_deref(), Some("hi"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn message_with_valid_id_keeps_it() {
        let id = MessageId::new();
        let record = record_from_item(item(
            Some("message"),
            Some(json!({"id": id.to_string(), "message": "hi"})),
        ))
        .unwrap();
        match record {
            Record::Message(m) => assert_eq!(m.id, Some(id)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn submitted_node_ids_are_trimmed_like_parsed_ones() {
        let position = record_from_item(item(
            Some("position"),
            Some(json!({"from": " X ", "location": "1,2"})),
        ))
        .unwrap();
        assert_eq!(position.node_id(), Some(&NodeId::from("X")));

        let telemetry =
            record_from_item(item(Some("telemetry"), Some(json!({"from": "  ", "battery": "80%"}))))
                .unwrap();
        assert_eq!(telemetry.node_id(), None);
    }

    #[test]
    fn padded_telemetry_sender_enriches_later_position() {
        let mut state = MeshState::default();
        let telemetry =
            record_from_item(item(Some("telemetry"), Some(json!({"from": "X ", "battery": "80%"}))))
                .unwrap();
        let position = record_from_item(item(
            Some("position"),
            Some(json!({"from": "X", "location": "1,2"})),
        ))
        .unwrap();
        state.apply(telemetry).unwrap();
        state.apply(position).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.telemetry.len(), 1);
        assert_eq!(snapshot.telemetry[0].node_id, Some(NodeId::from("X")));
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions[0].battery.as_deref(), Some("80%"));
    }

    #[test]
    fn unknown_type_becomes_unknown_record() {
        let record =
            record_from_item(item(Some("neighborinfo"), Some(json!({"from": "Z"})))).unwrap();
        match record {
            Record::Unknown(u) => {
                assert_eq!(u.type_name, "neighborinfo");
                assert_eq!(u.node_id, Some(NodeId::from("Z")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn summary_lists_nodes_per_kind() {
        let aliases = NodeAliases::from_pairs([("0x1", "Node Alpha")]);
        let mut report = BatchReport::new();
        assert_eq!(report.summary(&aliases), "no data");

        report.accept(RecordKind::Message, Some(&NodeId::from("0x1")));
        report.accept(RecordKind::Message, Some(&NodeId::from("0x1")));
        report.accept(RecordKind::Telemetry, Some(&NodeId::from("0x2")));
        report.reject();

        assert_eq!(report.total(), 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(
            report.summary(&aliases),
            "2 msg (Node Alpha), 1 telem (0x2)"
        );
    }
}
