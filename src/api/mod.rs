mod error;
mod intake;
mod rest;
mod types;

pub use error::{ApiError, ApiResult};
pub use intake::{submit_batch, validate_batch};
pub use rest::RestApi;
pub use types::*;

use crate::liveness::LivenessEngine;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the HTTP server that receives bandwidth batches
pub fn create_api_server(engine: LivenessEngine) -> Router {
    RestApi::new(engine)
        .router()
        .layer(TraceLayer::new_for_http())
}
