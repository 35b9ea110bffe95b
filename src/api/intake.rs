//! Report intake: shape validation in front of the liveness engine

use crate::api::error::{ApiError, ApiResult};
use crate::liveness::{BatchOutcome, LivenessEngine, PeerReport, ReportingNode};
use serde_json::Value;
use tracing::error;

/// Largest per-report count the durable counters can hold
const MAX_REPORT_BYTES: u64 = i64::MAX as u64;

/// Check that `body` is a sequence of peer reports.
///
/// Whether each peer resolves to a site is the engine's concern, not ours.
pub fn validate_batch(body: Value) -> ApiResult<Vec<PeerReport>> {
    let Value::Array(items) = body else {
        return Err(ApiError::InvalidInput(
            "expected an array of peer reports".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let report: PeerReport = serde_json::from_value(item)
                .map_err(|e| ApiError::InvalidInput(format!("report {index}: {e}")))?;

            if report.public_key.is_empty() {
                return Err(ApiError::InvalidInput(format!(
                    "report {index}: empty publicKey"
                )));
            }
            if report.bytes_in > MAX_REPORT_BYTES || report.bytes_out > MAX_REPORT_BYTES {
                return Err(ApiError::InvalidInput(format!(
                    "report {index}: byte count out of range"
                )));
            }
            Ok(report)
        })
        .collect()
}

/// Validate a batch and hand it to the engine. Engine failures are not
/// retried: the agent's next scheduled report supersedes this one.
pub async fn submit_batch(
    engine: &LivenessEngine,
    body: Value,
    node: Option<ReportingNode>,
) -> ApiResult<BatchOutcome> {
    let reports = validate_batch(body)?;

    engine
        .process_batch(&reports, node.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, reports = reports.len(), "failed to process bandwidth batch");
            ApiError::InternalError("failed to process bandwidth batch".to_string())
        })
}
