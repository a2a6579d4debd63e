use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use orchestrator::StopOutcome;
use research_core::{Report, ResearchOptions, Session};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartResearchRequest {
    pub query: String,
    #[serde(default)]
    pub options: ResearchOptions,
}

#[derive(Serialize, ToSchema)]
pub struct StartResearchResponse {
    pub status: String,
    pub session_id: Uuid,
    pub query: String,
    pub options: ResearchOptions,
    pub stream_url: String,
    pub stop_url: String,
    pub status_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct StopResearchResponse {
    /// `stopped` or `already_terminal`.
    pub status: String,
    pub session_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct SessionsListResponse {
    pub status: String,
    pub count: usize,
    pub sessions: Vec<Session>,
}

#[derive(Serialize, ToSchema)]
pub struct ReportResponse {
    pub session_id: Uuid,
    pub report: Report,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentInfo {
    pub document_id: String,
    pub session_id: Uuid,
    pub doc_type: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentsListResponse {
    pub session_id: Uuid,
    pub documents: Vec<DocumentInfo>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub document: DocumentInfo,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteSessionResponse {
    pub status: String,
    pub session_id: Uuid,
}

fn document_info(doc: &db::Document) -> DocumentInfo {
    DocumentInfo {
        document_id: doc.id.clone(),
        session_id: doc.session_id,
        doc_type: doc.doc_type.clone(),
        title: doc.title.clone(),
        metadata: doc.metadata.clone(),
        created_at: doc.created_at,
    }
}

#[utoipa::path(
    post,
    path = "/api/research/start",
    request_body = StartResearchRequest,
    responses(
        (status = 200, description = "Research session started", body = StartResearchResponse),
        (status = 400, description = "Invalid query or options")
    ),
    tag = "research"
)]
pub async fn start_research(
    State(state): State<AppState>,
    Json(request): Json<StartResearchRequest>,
) -> Result<Json<StartResearchResponse>, AppError> {
    let session = state.manager.start(&request.query, request.options).await?;
    let id = session.id;

    Ok(Json(StartResearchResponse {
        status: "started".to_string(),
        session_id: id,
        query: session.query,
        options: session.options,
        stream_url: format!("/api/research/{id}/events"),
        stop_url: format!("/api/research/{id}/stop"),
        status_url: format!("/api/research/{id}/status"),
    }))
}

#[utoipa::path(
    post,
    path = "/api/research/{id}/stop",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Stop outcome", body = StopResearchResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "research"
)]
pub async fn stop_research(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StopResearchResponse>, AppError> {
    let outcome = state.manager.stop(id).await?;
    let status = match outcome {
        StopOutcome::Stopped => "stopped",
        StopOutcome::AlreadyTerminal => "already_terminal",
    };
    Ok(Json(StopResearchResponse {
        status: status.to_string(),
        session_id: id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/research/{id}/status",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session status", body = Session),
        (status = 404, description = "Session not found")
    ),
    tag = "research"
)]
pub async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.manager.status(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/research/sessions",
    responses(
        (status = 200, description = "All sessions", body = SessionsListResponse)
    ),
    tag = "research"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsListResponse>, AppError> {
    let sessions = state.manager.list().await?;
    Ok(Json(SessionsListResponse {
        status: "success".to_string(),
        count: sessions.len(),
        sessions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/research/sessions/{id}/report",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Final report", body = ReportResponse),
        (status = 404, description = "Session or report not found")
    ),
    tag = "research"
)]
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    let report = state
        .manager
        .report(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No report available for session: {id}")))?;
    Ok(Json(ReportResponse {
        session_id: id,
        report,
    }))
}

#[utoipa::path(
    get,
    path = "/api/research/sessions/{id}/documents",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Persisted documents", body = DocumentsListResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "research"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentsListResponse>, AppError> {
    let documents = state.manager.documents(id).await?;
    Ok(Json(DocumentsListResponse {
        session_id: id,
        documents: documents.iter().map(document_info).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/research/sessions/{id}/documents/{document_id}",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("document_id" = String, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document content", body = DocumentResponse),
        (status = 404, description = "Session or document not found")
    ),
    tag = "research"
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path((id, document_id)): Path<(Uuid, String)>,
) -> Result<Json<DocumentResponse>, AppError> {
    let document = state.manager.document(id, &document_id).await?;
    Ok(Json(DocumentResponse {
        content: document.content.clone(),
        document: document_info(&document),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/research/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session deleted", body = DeleteSessionResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is running")
    ),
    tag = "research"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    state.manager.delete(id).await?;
    Ok(Json(DeleteSessionResponse {
        status: "deleted".to_string(),
        session_id: id,
    }))
}
