//! Telemetry emitted as a side effect of ingestion
//!
//! Everything here is write-only from the engine's point of view. Sink
//! failures are reported back to the caller, which discards them.
//!
//! Key metrics:
//! - Per-site bandwidth by direction and transport
//! - Per-organization bandwidth and uptime
//! - Batch outcomes and offline tracker size

pub mod recorder;
pub mod sink;

pub use recorder::init_metrics;
pub use sink::{BandwidthObservation, Direction, MetricsSink, TelemetryError, TelemetrySink};
