//! Site liveness and bandwidth-aggregation ingestion service.
//!
//! Remote agents post periodic per-peer bandwidth reports. Each batch is
//! applied in one transaction: active peers bring their site online and add
//! to its traffic counters, idle peers take a stale site offline, and the
//! deltas are rolled up per organization.

pub mod api;
pub mod config;
pub mod liveness;
pub mod site;
pub mod telemetry;
