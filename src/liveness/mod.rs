//! Site liveness and bandwidth aggregation
//!
//! Applies batches of peer bandwidth reports against durable site state:
//! active reports bring a site online and accumulate its counters, idle
//! reports take it offline once its last activity is older than the
//! staleness window. Each batch commits or aborts as a whole.

mod engine;
mod error;
mod state_machine;
mod tracker;
mod types;

pub use engine::LivenessEngine;
pub use error::{IngestError, IngestResult};
pub use state_machine::{classify, LivenessState, Transition};
pub use tracker::OfflineTracker;
pub use types::{BatchOutcome, BatchSummary, EngineConfig, OrgAggregate, PeerReport, ReportingNode};
