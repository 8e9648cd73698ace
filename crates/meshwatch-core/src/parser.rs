//! Incremental record parser for the mesh monitor's text output.
//!
//! The monitor prints each record as a block that begins with a header
//! line carrying a marker and an optional bracketed timestamp:
//!
//! ```text
//! ============================================================
//! 📨 MESSAGE [2024-01-01 12:00:00]
//! From: Node Echo
//! Hello from the ridge
//! RSSI: -92 dBm | SNR: 6.25 dB | Battery: 80%
//! ============================================================
//! ```
//!
//! There is no end delimiter, so a block is complete only once the next
//! header arrives or the stream is closed. [`RecordParser::feed`] accepts
//! arbitrary chunks, buffers a trailing partial line, and keeps the
//! in-progress block across calls. A chunk boundary never finalises a
//! block; callers that need the last block of a burst promptly use
//! [`RecordParser::flush`].

use meshwatch_types::{MessageRecord, PositionRecord, Record, TelemetryRecord, now_timestamp};
use tracing::debug;

use crate::extract::{RawFields, apply_rule, header_timestamp};

/// Kind of block announced by a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Message,
    Position,
    Telemetry,
}

/// Header markers, checked in order against each trimmed line.
const HEADER_MARKERS: [(&str, BlockKind); 3] = [
    ("📨 MESSAGE", BlockKind::Message),
    ("📍 POSITION UPDATE", BlockKind::Position),
    ("📊 TELEMETRY", BlockKind::Telemetry),
];

fn header_kind(line: &str) -> Option<BlockKind> {
    HEADER_MARKERS
        .iter()
        .find(|(marker, _)| line.contains(marker))
        .map(|(_, kind)| *kind)
}

/// A block whose header has been seen but which is not yet complete.
#[derive(Debug, Clone)]
struct PendingBlock {
    kind: BlockKind,
    timestamp: String,
    fields: RawFields,
}

impl PendingBlock {
    fn take_line(&mut self, line: &str) {
        if apply_rule(line, &mut self.fields) {
            return;
        }
        // First free-text line of a message block is its body.
        if self.kind == BlockKind::Message
            && self.fields.body.is_none()
            && !line.is_empty()
            && !line.starts_with('=')
        {
            self.fields.body = Some(line.to_owned());
        }
    }

    fn finish(self) -> Option<Record> {
        let Self {
            kind,
            timestamp,
            fields,
        } = self;
        match kind {
            BlockKind::Message => Some(Record::Message(MessageRecord {
                id: None,
                timestamp,
                node_id: fields.node_id,
                body: fields.body,
                location: fields.location,
                altitude: fields.altitude,
                rssi: fields.rssi,
                snr: fields.snr,
                battery: fields.battery,
                map_link: fields.map_link,
            })),
            BlockKind::Position => {
                let Some((latitude, longitude)) = fields
                    .location
                    .as_deref()
                    .and_then(PositionRecord::parse_coordinates)
                else {
                    debug!(
                        node = ?fields.node_id,
                        location = ?fields.location,
                        "Position block without usable coordinates dropped"
                    );
                    return None;
                };
                Some(Record::Position(PositionRecord {
                    timestamp,
                    node_id: fields.node_id,
                    latitude,
                    longitude,
                    altitude: fields.altitude,
                    battery: fields.battery,
                    rssi: fields.rssi,
                    snr: fields.snr,
                }))
            }
            BlockKind::Telemetry => Some(Record::Telemetry(TelemetryRecord {
                timestamp,
                node_id: fields.node_id,
                battery: fields.battery,
                voltage: fields.voltage,
                channel_util_percent: fields.channel_util_percent,
                air_util_percent: fields.air_util_percent,
                uptime_hours: fields.uptime_hours,
            })),
        }
    }
}

/// Stateful parser for one upstream text stream.
#[derive(Debug, Default)]
pub struct RecordParser {
    /// Trailing text of the last chunk that had no newline yet.
    partial: String,
    /// The block currently being filled in.
    current: Option<PendingBlock>,
}

impl RecordParser {
    /// Create a parser with no buffered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of text and return every record completed by it.
    ///
    /// A record is completed when the header of the next record is seen.
    /// The block in progress at the end of the chunk is kept for the next
    /// call.
    pub fn feed(&mut self, chunk: &str) -> Vec<Record> {
        let mut buffer = std::mem::take(&mut self.partial);
        buffer.push_str(chunk);
        let consumed = buffer.rfind('\n').map_or(0, |newline| newline.saturating_add(1));

        let mut completed = Vec::new();
        for line in buffer.get(..consumed).unwrap_or_default().split_inclusive('\n') {
            self.take_line(line, &mut completed);
        }

        buffer.replace_range(..consumed, "");
        self.partial = buffer;
        completed
    }

    /// Finalise the block in progress, if any, without consuming buffered
    /// partial text. The parser stays usable.
    pub fn flush(&mut self) -> Option<Record> {
        self.current.take().and_then(PendingBlock::finish)
    }

    /// End of stream: treat buffered partial text as a final line, then
    /// finalise the block in progress.
    pub fn close(&mut self) -> Vec<Record> {
        let mut completed = Vec::new();
        let rest = std::mem::take(&mut self.partial);
        if !rest.is_empty() {
            self.take_line(&rest, &mut completed);
        }
        completed.extend(self.flush());
        completed
    }

    /// Whether a block is currently open.
    pub const fn has_pending(&self) -> bool {
        self.current.is_some()
    }

    fn take_line(&mut self, raw: &str, completed: &mut Vec<Record>) {
        let line = raw.trim();
        if let Some(kind) = header_kind(line) {
            completed.extend(self.flush());
            self.current = Some(PendingBlock {
                kind,
                timestamp: header_timestamp(line).unwrap_or_else(now_timestamp),
                fields: RawFields::default(),
            });
        } else if let Some(block) = self.current.as_mut() {
            block.take_line(line);
        }
    }
}

/// Parse a complete text in one go (feed, then close).
pub fn parse_all(text: &str) -> Vec<Record> {
    let mut parser = RecordParser::new();
    let mut records = parser.feed(text);
    records.extend(parser.close());
    records
}
