use crate::api::error::{ApiError, ApiResult};
use crate::api::intake::submit_batch;
use crate::api::types::*;
use crate::liveness::{LivenessEngine, ReportingNode};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

pub struct RestApi {
    engine: Arc<LivenessEngine>,
}

impl RestApi {
    pub fn new(engine: LivenessEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/api/v1/bandwidth", post(receive_bandwidth))
            .route("/api/v1/sites/:pub_key", get(get_site_status))
            .with_state(self.engine.clone())
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn receive_bandwidth(
    State(engine): State<Arc<LivenessEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let node = reporting_node(&headers)?;
    let body = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidInput(format!("malformed JSON: {e}")))?;

    let outcome = submit_batch(&engine, body, node).await?;

    Ok(Json(IngestResponse {
        message: format!("Processed {} bandwidth reports", outcome.summary.reports),
        summary: outcome.summary,
        org_usage: outcome.org_usage,
    }))
}

async fn get_site_status(
    State(engine): State<Arc<LivenessEngine>>,
    Path(pub_key): Path<String>,
) -> ApiResult<Json<SiteStatusResponse>> {
    let site = engine
        .store()
        .get_site_by_pub_key(&pub_key)
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("No site for peer: {pub_key}")))?;

    Ok(Json(SiteStatusResponse {
        tracked_offline: engine.tracker().contains(&site.pub_key),
        site,
    }))
}

fn reporting_node(headers: &HeaderMap) -> ApiResult<Option<ReportingNode>> {
    let Some(value) = headers.get(REPORTING_NODE_HEADER) else {
        return Ok(None);
    };

    let node = value
        .to_str()
        .map_err(|_| ApiError::InvalidInput(format!("{REPORTING_NODE_HEADER} is not valid text")))?
        .trim();

    if node.is_empty() {
        return Ok(None);
    }
    Ok(Some(ReportingNode::new(node)))
}
