use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Site not found: {0}")]
    NotFound(String),

    #[error("Site already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for SiteError {
    fn from(err: sqlx::Error) -> Self {
        SiteError::DatabaseError(err.to_string())
    }
}

pub type SiteResult<T> = Result<T, SiteError>;
