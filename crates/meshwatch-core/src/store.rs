//! Latest known state per node, and battery enrichment.
//!
//! The store keeps at most one position and one telemetry snapshot per
//! node; each update overwrites the previous one. Telemetry is folded
//! into the stored position at write time (the battery reading), and
//! [`NodeStore::enrich_message`] / [`NodeStore::enrich_position`] fill a
//! missing battery from telemetry at read time. Read-time enrichment
//! always works on a copy so records that were already broadcast are
//! never altered after the fact.

use std::collections::BTreeMap;

use meshwatch_types::{MessageRecord, NodeId, PositionRecord, TelemetryRecord, is_missing_battery};

/// Per-node position and telemetry snapshots.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    positions: BTreeMap<NodeId, PositionRecord>,
    telemetry: BTreeMap<NodeId, TelemetryRecord>,
}

impl NodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a telemetry snapshot and copy its battery reading into the
    /// node's stored position, if there is one.
    pub fn update_telemetry(&mut self, node: NodeId, telemetry: TelemetryRecord) {
        if !is_missing_battery(telemetry.battery.as_deref())
            && let Some(position) = self.positions.get_mut(&node)
        {
            position.battery.clone_from(&telemetry.battery);
        }
        self.telemetry.insert(node, telemetry);
    }

    /// Store a position as-is, replacing the node's previous position.
    pub fn update_position(&mut self, node: NodeId, position: PositionRecord) {
        self.positions.insert(node, position);
    }

    /// Battery from the node's telemetry snapshot, if it has a usable one.
    pub fn telemetry_battery(&self, node: Option<&NodeId>) -> Option<&str> {
        let battery = self.telemetry.get(node?)?.battery.as_deref();
        if is_missing_battery(battery) {
            None
        } else {
            battery
        }
    }

    /// Copy of `message` with a missing battery filled from telemetry.
    pub fn enrich_message(&self, message: &MessageRecord) -> MessageRecord {
        let mut enriched = message.clone();
        if is_missing_battery(enriched.battery.as_deref())
            && let Some(battery) = self.telemetry_battery(message.node_id.as_ref())
        {
            enriched.battery = Some(battery.to_owned());
        }
        enriched
    }

    /// Copy of `position` with a missing battery filled from telemetry.
    pub fn enrich_position(&self, position: &PositionRecord) -> PositionRecord {
        let mut enriched = position.clone();
        if is_missing_battery(enriched.battery.as_deref())
            && let Some(battery) = self.telemetry_battery(position.node_id.as_ref())
        {
            enriched.battery = Some(battery.to_owned());
        }
        enriched
    }

    /// Stored position for a node (not enriched).
    pub fn position(&self, node: &NodeId) -> Option<&PositionRecord> {
        self.positions.get(node)
    }

    /// Stored telemetry for a node.
    pub fn telemetry(&self, node: &NodeId) -> Option<&TelemetryRecord> {
        self.telemetry.get(node)
    }

    /// Enriched copies of every stored position, ordered by node id.
    pub fn enriched_positions(&self) -> Vec<PositionRecord> {
        self.positions
            .values()
            .map(|p| self.enrich_position(p))
            .collect()
    }

    /// Copies of every telemetry snapshot, ordered by node id.
    pub fn telemetry_snapshots(&self) -> Vec<TelemetryRecord> {
        self.telemetry.values().cloned().collect()
    }

    /// Number of nodes with a known position.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of nodes with a telemetry snapshot.
    pub fn telemetry_count(&self) -> usize {
        self.telemetry.len()
    }

    /// Drop everything. Returns positions + telemetry entries removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.positions.len().saturating_add(self.telemetry.len());
        self.positions.clear();
        self.telemetry.clear();
        removed
    }
}
