use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    BadRequest { code: &'static str, message: String },
    NotFound(String),
    Conflict { code: &'static str, message: String },
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidOptions(inner) => AppError::BadRequest {
                code: "invalid_options",
                message: inner.to_string(),
            },
            OrchestratorError::InvalidQuery(message) => AppError::BadRequest {
                code: "invalid_query",
                message,
            },
            OrchestratorError::SessionNotFound(id) => {
                AppError::NotFound(format!("Session not found: {id}"))
            }
            OrchestratorError::DocumentNotFound(id) => {
                AppError::NotFound(format!("Document not found: {id}"))
            }
            OrchestratorError::SessionActive(id) => AppError::Conflict {
                code: "session_active",
                message: format!("Session is running: {id}"),
            },
            OrchestratorError::Database(err) => AppError::Internal(err.to_string()),
            OrchestratorError::ExecutionFailed(msg) => AppError::Internal(msg),
        }
    }
}
