//! Telemetry sink used by the liveness engine

use crate::telemetry::recorder::{ORG_BANDWIDTH_BYTES, ORG_UPTIME_MINUTES, SITE_BANDWIDTH_BYTES};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Traffic direction, from the reporting peer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthObservation {
    pub site_id: String,
    pub direction: Direction,
    pub transport: String,
    pub bytes: u64,
}

/// Write-only destination for ingestion telemetry.
///
/// Implementations return errors instead of swallowing them; the engine is
/// the one that discards them.
pub trait TelemetrySink: Send + Sync {
    fn add_bandwidth(&self, observation: &BandwidthObservation) -> Result<(), TelemetryError>;

    fn add_org_usage(
        &self,
        org_id: &str,
        bandwidth_bytes: u64,
        uptime_minutes: f64,
    ) -> Result<(), TelemetryError>;
}

/// Sink backed by the global `metrics` recorder
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl TelemetrySink for MetricsSink {
    fn add_bandwidth(&self, observation: &BandwidthObservation) -> Result<(), TelemetryError> {
        if observation.site_id.is_empty() {
            return Err(TelemetryError::InvalidObservation(
                "missing site id".to_string(),
            ));
        }

        counter!(
            SITE_BANDWIDTH_BYTES,
            "site_id" => observation.site_id.clone(),
            "direction" => observation.direction.as_str(),
            "transport" => observation.transport.clone()
        )
        .increment(observation.bytes);
        Ok(())
    }

    fn add_org_usage(
        &self,
        org_id: &str,
        bandwidth_bytes: u64,
        uptime_minutes: f64,
    ) -> Result<(), TelemetryError> {
        if !uptime_minutes.is_finite() || uptime_minutes < 0.0 {
            return Err(TelemetryError::InvalidObservation(format!(
                "uptime {uptime_minutes} for org {org_id}"
            )));
        }

        counter!(ORG_BANDWIDTH_BYTES, "org_id" => org_id.to_string()).increment(bandwidth_bytes);
        gauge!(ORG_UPTIME_MINUTES, "org_id" => org_id.to_string()).increment(uptime_minutes);
        Ok(())
    }
}
