//! Core of the Meshwatch relay: turning the mesh monitor's text output
//! into records and keeping the latest state per node.
//!
//! - [`parser`] -- incremental text-to-record parser
//! - [`extract`] -- per-keyword field extraction table used by the parser
//! - [`structured`] -- conversion of structured `{type, data}` submissions
//! - [`store`] -- latest position and telemetry per node, battery enrichment
//! - [`history`] -- bounded FIFO of recent messages
//! - [`state`] -- the update routine both ingress paths share
//! - [`registry`] -- subscriber admission control
//! - [`config`] -- YAML configuration with environment overrides
//!
//! # Concurrency
//!
//! Everything here is synchronous and single-owner. The broadcast hub
//! wraps [`state::MeshState`] and [`registry::SubscriberRegistry`] behind
//! one lock so that updates, snapshots and admissions are serialised.

pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod parser;
pub mod registry;
pub mod state;
pub mod store;
pub mod structured;

pub use config::{ConfigError, MeshwatchConfig, NodeAliases};
pub use error::Rejection;
pub use history::{HistoryRing, MAX_MESSAGES};
pub use parser::RecordParser;
pub use registry::{AdmissionError, MAX_SUBSCRIBERS, SubscriberId, SubscriberRegistry};
pub use state::{DeleteOutcome, MeshState, StateCounts, StateSnapshot};
pub use store::NodeStore;
pub use structured::{BatchReport, ProcessedCounts, record_from_item};
