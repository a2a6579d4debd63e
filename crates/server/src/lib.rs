pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Deep Research API",
        version = "0.1.0",
        description = "Session orchestration for the multi-stage research pipeline"
    ),
    paths(
        routes::health_check,
        routes::start_research,
        routes::stop_research,
        routes::session_status,
        routes::list_sessions,
        routes::get_report,
        routes::list_documents,
        routes::get_document,
        routes::delete_session,
        routes::sse::research_events,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::StartResearchRequest,
        routes::StartResearchResponse,
        routes::StopResearchResponse,
        routes::SessionsListResponse,
        routes::ReportResponse,
        routes::DocumentInfo,
        routes::DocumentsListResponse,
        routes::DocumentResponse,
        routes::DeleteSessionResponse,
        research_core::Session,
        research_core::SessionStatus,
        research_core::Stage,
        research_core::ResearchOptions,
        research_core::ReportLength,
        research_core::Report,
        research_core::ReportSection,
        research_core::Source,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "research", description = "Research session lifecycle and streaming"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/api/research/start", post(routes::start_research))
        .route("/api/research/{id}/events", get(routes::sse::research_events))
        .route("/api/research/{id}/stop", post(routes::stop_research))
        .route("/api/research/{id}/status", get(routes::session_status))
        .route("/api/research/sessions", get(routes::list_sessions))
        .route(
            "/api/research/sessions/{id}",
            axum::routing::delete(routes::delete_session),
        )
        .route(
            "/api/research/sessions/{id}/report",
            get(routes::get_report),
        )
        .route(
            "/api/research/sessions/{id}/documents",
            get(routes::list_documents),
        )
        .route(
            "/api/research/sessions/{id}/documents/{document_id}",
            get(routes::get_document),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
