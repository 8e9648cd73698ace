//! Shared type definitions for the Meshwatch relay.
//!
//! This crate is the single source of truth for the records reconstructed
//! from the mesh monitor's output and for the events pushed to dashboard
//! subscribers. Types defined here flow downstream to `TypeScript` via
//! `ts-rs` for the live map dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Node and message identifiers
//! - [`record`] -- The [`Record`] sum type and its per-kind payloads
//! - [`events`] -- Egress events delivered to subscribers
//! - [`ingress`] -- Wire shapes accepted by the structured ingress

pub mod events;
pub mod ids;
pub mod ingress;
pub mod record;

// Re-export all public types at crate root for convenience.
pub use events::{InitialData, MeshEvent, MessageDeleted};
pub use ids::{MessageId, NodeId};
pub use ingress::{BatchSubmission, IngressItem};
pub use record::{
    MessageRecord, PositionRecord, Record, RecordKind, TelemetryRecord, UnknownRecord,
    is_missing_battery, now_timestamp,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to `bindings/`
        // relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::NodeId::export_all();
        let _ = crate::ids::MessageId::export_all();
        let _ = crate::record::Record::export_all();
        let _ = crate::events::MeshEvent::export_all();
    }
}
