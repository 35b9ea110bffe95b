use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// One sample from one remote agent. Byte counts are deltas since the
/// agent's previous report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerReport {
    pub public_key: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl PeerReport {
    pub fn new(public_key: impl Into<String>, bytes_in: u64, bytes_out: u64) -> Self {
        Self {
            public_key: public_key.into(),
            bytes_in,
            bytes_out,
        }
    }

    /// Active reports carry inbound bytes; only they refresh liveness.
    pub fn is_active(&self) -> bool {
        self.bytes_in > 0
    }
}

/// Identity of the node that relayed a batch, when the caller supplies one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportingNode(pub String);

impl ReportingNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time since the last active report after which an idle site is offline
    pub staleness_window: Duration,
    /// Uptime credited per active report
    pub uptime_quantum: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::from_secs(60),
            uptime_quantum: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn uptime_quantum_minutes(&self) -> f64 {
        self.uptime_quantum.as_secs_f64() / 60.0
    }
}

/// Per-organization totals accrued by one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgAggregate {
    pub bandwidth: HashMap<String, u64>,
    pub uptime_minutes: HashMap<String, f64>,
}

impl OrgAggregate {
    /// Bandwidth totals saturate at `u64::MAX`.
    pub fn record_active(&mut self, org_id: &str, bytes: u64, minutes: f64) {
        let total = self.bandwidth.entry(org_id.to_string()).or_insert(0);
        *total = total.saturating_add(bytes);
        *self.uptime_minutes.entry(org_id.to_string()).or_insert(0.0) += minutes;
    }

    pub fn bandwidth_for(&self, org_id: &str) -> u64 {
        self.bandwidth.get(org_id).copied().unwrap_or(0)
    }

    pub fn uptime_for(&self, org_id: &str) -> f64 {
        self.uptime_minutes.get(org_id).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.bandwidth.is_empty()
    }

    /// Iterate `(org_id, bandwidth, uptime_minutes)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64, f64)> + '_ {
        self.bandwidth
            .iter()
            .map(|(org, bytes)| (org.as_str(), *bytes, self.uptime_for(org)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub reports: usize,
    pub marked_online: usize,
    pub marked_offline: usize,
    pub unchanged: usize,
    pub skipped_unknown: usize,
    pub skipped_tracked: usize,
    /// Durable writes issued inside the batch transaction
    pub writes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub org_usage: OrgAggregate,
    pub summary: BatchSummary,
}
