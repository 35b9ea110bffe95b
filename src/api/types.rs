use crate::liveness::{BatchSummary, OrgAggregate};
use crate::site::Site;
use serde::{Deserialize, Serialize};

/// Header carrying the identity of the node that relayed a batch
pub const REPORTING_NODE_HEADER: &str = "x-reporting-node";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub summary: BatchSummary,
    pub org_usage: OrgAggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatusResponse {
    pub site: Site,
    pub tracked_offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
