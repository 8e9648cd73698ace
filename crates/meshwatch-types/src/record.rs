//! Reconstructed mesh records.
//!
//! A [`Record`] is one domain event attributed to a node: a text message,
//! a GPS position report, or a device telemetry report. Records are built
//! either by the stream parser in `meshwatch-core` or from structured
//! submissions, and are immutable once handed to the broadcast hub.
//!
//! Measurement fields that the upstream monitor prints with units
//! (battery `"80%"`, voltage `"3.95V"`, altitude `"120m"`) are kept as the
//! display strings the monitor produced. The literal `"N/A"` is the
//! monitor's sentinel for "no reading" and is treated as absent by
//! enrichment (see [`is_missing_battery`]).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{MessageId, NodeId};

/// Sentinel the upstream monitor prints when a reading is unavailable.
pub const NOT_AVAILABLE: &str = "N/A";

/// Current wall-clock time as an ISO-8601 UTC string with millisecond
/// precision (e.g. `2024-01-01T00:00:00.000Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a battery reading is absent for enrichment purposes.
///
/// `None`, blank strings and the `"N/A"` sentinel all count as missing.
pub fn is_missing_battery(battery: Option<&str>) -> bool {
    battery.is_none_or(|b| {
        let b = b.trim();
        b.is_empty() || b == NOT_AVAILABLE
    })
}

/// Discriminant of a [`Record`], used in logs and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum RecordKind {
    /// Free-text message.
    Message,
    /// GPS position report.
    Position,
    /// Device telemetry report.
    Telemetry,
    /// Anything else.
    Unknown,
}

impl RecordKind {
    /// Lowercase name as used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Position => "position",
            Self::Telemetry => "telemetry",
            Self::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reconstructed domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Record {
    /// A text message sent over the mesh.
    Message(MessageRecord),
    /// A GPS position report.
    Position(PositionRecord),
    /// A device telemetry report.
    Telemetry(TelemetryRecord),
    /// A record whose type was not recognised. Never stored.
    Unknown(UnknownRecord),
}

impl Record {
    /// The record's discriminant.
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Message(_) => RecordKind::Message,
            Self::Position(_) => RecordKind::Position,
            Self::Telemetry(_) => RecordKind::Telemetry,
            Self::Unknown(_) => RecordKind::Unknown,
        }
    }

    /// The originating node, if known.
    pub const fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Message(m) => m.node_id.as_ref(),
            Self::Position(p) => p.node_id.as_ref(),
            Self::Telemetry(t) => t.node_id.as_ref(),
            Self::Unknown(u) => u.node_id.as_ref(),
        }
    }

    /// The record's timestamp string.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Message(m) => &m.timestamp,
            Self::Position(p) => &p.timestamp,
            Self::Telemetry(t) => &t.timestamp,
            Self::Unknown(u) => &u.timestamp,
        }
    }
}

/// A text message heard on the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MessageRecord {
    /// History id, assigned when the message is stored. A submitted value
    /// that is not a message id is dropped so that a fresh one is assigned.
    #[serde(default, deserialize_with = "lenient::option_message_id")]
    pub id: Option<MessageId>,
    /// When the message was received (ISO-8601 or the monitor's local format).
    #[serde(default = "now_timestamp")]
    pub timestamp: String,
    /// Sender.
    #[serde(default, alias = "from", deserialize_with = "lenient::option_node")]
    pub node_id: Option<NodeId>,
    /// Message text.
    #[serde(default, alias = "message")]
    pub body: Option<String>,
    /// Sender position as the raw `"lat, lng"` string.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub location: Option<String>,
    /// Sender altitude (e.g. `"120m"`).
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub altitude: Option<String>,
    /// Received signal strength.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub rssi: Option<String>,
    /// Signal-to-noise ratio.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub snr: Option<String>,
    /// Sender battery (e.g. `"80%"` or `"3.95V (80%)"`).
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub battery: Option<String>,
    /// Link to the sender position on a map.
    #[serde(default)]
    pub map_link: Option<String>,
}

impl MessageRecord {
    /// An empty message stamped with `timestamp`.
    pub const fn empty(timestamp: String) -> Self {
        Self {
            id: None,
            timestamp,
            node_id: None,
            body: None,
            location: None,
            altitude: None,
            rssi: None,
            snr: None,
            battery: None,
            map_link: None,
        }
    }
}

/// A GPS position report. Only exists with finite coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PositionRecord {
    /// When the report was received.
    #[serde(default = "now_timestamp")]
    pub timestamp: String,
    /// Reporting node.
    #[serde(default, alias = "from", deserialize_with = "lenient::option_node")]
    pub node_id: Option<NodeId>,
    /// Latitude in decimal degrees.
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(alias = "lng")]
    pub longitude: f64,
    /// Altitude (e.g. `"120m"`).
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub altitude: Option<String>,
    /// Battery at capture time, possibly filled in later from telemetry.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub battery: Option<String>,
    /// Received signal strength.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub rssi: Option<String>,
    /// Signal-to-noise ratio.
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub snr: Option<String>,
}

impl PositionRecord {
    /// Parse a `"lat,lng"` pair. Returns `None` unless both halves parse
    /// as finite numbers.
    pub fn parse_coordinates(location: &str) -> Option<(f64, f64)> {
        let (lat, lng) = location.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lng: f64 = lng.trim().parse().ok()?;
        (lat.is_finite() && lng.is_finite()).then_some((lat, lng))
    }
}

/// A device telemetry report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TelemetryRecord {
    /// When the report was received.
    #[serde(default = "now_timestamp")]
    pub timestamp: String,
    /// Reporting node.
    #[serde(default, alias = "from", deserialize_with = "lenient::option_node")]
    pub node_id: Option<NodeId>,
    /// Battery level (e.g. `"80%"`).
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub battery: Option<String>,
    /// Battery voltage (e.g. `"4.1V"`).
    #[serde(default, deserialize_with = "lenient::option_text")]
    pub voltage: Option<String>,
    /// Channel utilisation in percent.
    #[serde(default, alias = "channelUtil", deserialize_with = "lenient::option_number")]
    pub channel_util_percent: Option<f64>,
    /// Transmit air utilisation in percent.
    #[serde(default, alias = "airUtil", deserialize_with = "lenient::option_number")]
    pub air_util_percent: Option<f64>,
    /// Device uptime in hours.
    #[serde(default, alias = "uptime", deserialize_with = "lenient::option_number")]
    pub uptime_hours: Option<f64>,
}

impl TelemetryRecord {
    /// An empty telemetry report stamped with `timestamp`.
    pub const fn empty(timestamp: String) -> Self {
        Self {
            timestamp,
            node_id: None,
            battery: None,
            voltage: None,
            channel_util_percent: None,
            air_util_percent: None,
            uptime_hours: None,
        }
    }
}

/// A record with an unrecognised type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UnknownRecord {
    /// The type tag as submitted.
    pub type_name: String,
    /// When the record was received.
    #[serde(default = "now_timestamp")]
    pub timestamp: String,
    /// Originating node, if any.
    #[serde(default, alias = "from", deserialize_with = "lenient::option_node")]
    pub node_id: Option<NodeId>,
}

/// Deserializers tolerant of the loosely typed upstream agent, for use
/// with `#[serde(deserialize_with = ...)]`.
pub mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    use crate::ids::{MessageId, NodeId};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Number(f64),
        Text(String),
        Other(IgnoredAny),
    }

    /// Accept a string or a bare number as display text.
    pub fn option_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Scalar>::deserialize(d)? {
            Some(Scalar::Text(t)) => Some(t),
            Some(Scalar::Number(n)) => Some(n.to_string()),
            Some(Scalar::Other(_)) | None => None,
        })
    }

    /// Accept a number or a numeric string (optionally with a `%` suffix).
    /// Anything unparseable becomes `None`.
    pub fn option_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = match Option::<Scalar>::deserialize(d)? {
            Some(Scalar::Number(n)) => Some(n),
            Some(Scalar::Text(t)) => t.trim().trim_end_matches('%').trim().parse().ok(),
            Some(Scalar::Other(_)) | None => None,
        };
        Ok(value.filter(|v: &f64| v.is_finite()))
    }

    /// Accept a node id as text or a bare number, trimmed the same way as
    /// parsed node ids. Blank text becomes `None`.
    pub fn option_node<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NodeId>, D::Error> {
        Ok(option_text(d)?.as_deref().and_then(NodeId::from_text))
    }

    /// Accept a message id string. Anything that does not parse as one
    /// becomes `None`.
    pub fn option_message_id<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<MessageId>, D::Error> {
        Ok(match Option::<Scalar>::deserialize(d)? {
            Some(Scalar::Text(t)) => t.parse().ok(),
            Some(Scalar::Number(_) | Scalar::Other(_)) | None => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_require_two_finite_numbers() {
        assert_eq!(
            PositionRecord::parse_coordinates("37.1, -122.2"),
            Some((37.1, -122.2))
        );
        assert_eq!(PositionRecord::parse_coordinates("notanumber,-122.2"), None);
        assert_eq!(PositionRecord::parse_coordinates("37.1"), None);
        assert_eq!(PositionRecord::parse_coordinates("inf,1"), None);
    }

    #[test]
    fn missing_battery_covers_sentinel() {
        assert!(is_missing_battery(None));
        assert!(is_missing_battery(Some("N/A")));
        assert!(is_missing_battery(Some("  ")));
        assert!(!is_missing_battery(Some("80%")));
    }

    #[test]
    fn telemetry_accepts_legacy_field_names() {
        let json = serde_json::json!({
            "from": "0x9e7595c4",
            "battery": "80%",
            "voltage": "4.1V",
            "channelUtil": "12.5",
            "airUtil": 3.25,
            "uptime": "not-a-number",
        });
        let t: TelemetryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(t.node_id, Some(NodeId::from("0x9e7595c4")));
        assert_eq!(t.channel_util_percent, Some(12.5));
        assert_eq!(t.air_util_percent, Some(3.25));
        assert_eq!(t.uptime_hours, None);
        assert!(!t.timestamp.is_empty());
    }

    #[test]
    fn record_is_tagged_by_kind() {
        let record = Record::Message(MessageRecord {
            body: Some(String::from("hello")),
            ..MessageRecord::empty(String::from("2024-01-01T00:00:00Z"))
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "message");
        assert_eq!(json["body"], "hello");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn node_ids_are_trimmed_and_blank_ones_dropped() {
        let t: TelemetryRecord = serde_json::from_value(serde_json::json!({ "from": " X " })).unwrap();
        assert_eq!(t.node_id, Some(NodeId::from("X")));

        let t: TelemetryRecord = serde_json::from_value(serde_json::json!({ "nodeId": "   " })).unwrap();
        assert_eq!(t.node_id, None);

        let t: TelemetryRecord = serde_json::from_value(serde_json::json!({ "from": true })).unwrap();
        assert_eq!(t.node_id, None);
    }

    #[test]
    fn message_accepts_numeric_rssi() {
        let json = serde_json::json!({ "message": "hi", "rssi": -92, "snr": 5.5 });
        let m: MessageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(m.body.as_deref(), Some("hi"));
        assert_eq!(m.rssi.as_deref(), Some("-92"));
        assert_eq!(m.snr.as_deref(), Some("5.5"));
    }
}
