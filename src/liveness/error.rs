use crate::site::SiteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No site for peer: {0}")]
    SiteNotFound(String),

    #[error("Node {node} is not authorized for organization {org}")]
    Unauthorized { node: String, org: String },

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl IngestError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidInput(_) => "invalid_input",
            IngestError::SiteNotFound(_) => "site_not_found",
            IngestError::Unauthorized { .. } => "unauthorized",
            IngestError::StorageError(_) => "storage",
        }
    }
}

impl From<SiteError> for IngestError {
    fn from(err: SiteError) -> Self {
        match err {
            SiteError::NotFound(id) => IngestError::SiteNotFound(id),
            other => IngestError::StorageError(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::StorageError(err.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
