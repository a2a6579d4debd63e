use research_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid options: {0}")]
    InvalidOptions(CoreError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session is running: {0}")]
    SessionActive(Uuid),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Database error: {0}")]
    Database(db::DbError),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SessionNotFound(id) => Self::SessionNotFound(id),
            CoreError::Validation(msg) => Self::InvalidQuery(msg),
            out_of_range => Self::InvalidOptions(out_of_range),
        }
    }
}

impl From<db::DbError> for OrchestratorError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::SessionNotFound(id) => Self::SessionNotFound(id),
            other => Self::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
