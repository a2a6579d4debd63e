use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use orchestrator::agents::{
    AgentError, AgentSet, WriterAgent, WriterInput,
};
use orchestrator::{ManagerConfig, SessionManager};
use research_core::{Report, ResearchOptions};
use serde_json::{json, Value};
use server::state::AppState;
use server::create_router;
use tempfile::TempDir;

async fn setup_server_with_agents(agents: AgentSet) -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = db::create_pool(&db_url).await.expect("Failed to create pool");
    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let manager = Arc::new(SessionManager::new(pool, agents, ManagerConfig::default()));
    let app = create_router(AppState::new(manager));
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, temp_dir)
}

async fn setup_server() -> (TestServer, TempDir) {
    setup_server_with_agents(AgentSet::offline()).await
}

async fn wait_for_status(server: &TestServer, session_id: &str, expected: &str) -> Value {
    for _ in 0..200 {
        let response = server
            .get(&format!("/api/research/{session_id}/status"))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        if body["status"] == expected {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached status {expected}");
}

struct BlockedWriter;

#[async_trait::async_trait]
impl WriterAgent for BlockedWriter {
    async fn write_report(
        &self,
        _input: WriterInput,
        _options: &ResearchOptions,
    ) -> Result<Report, AgentError> {
        futures::future::pending::<()>().await;
        unreachable!("pending future completed")
    }
}

fn blocked_agents() -> AgentSet {
    AgentSet {
        writer: Arc::new(BlockedWriter),
        ..AgentSet::offline()
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _temp_dir) = setup_server().await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}

mod start_validation {
    use super::*;

    #[tokio::test]
    async fn test_start_research_contract() {
        let (server, _temp_dir) = setup_server().await;

        let response = server
            .post("/api/research/start")
            .json(&json!({
                "query": "Latest changes in AI regulation",
                "options": {
                    "maxIterations": 4,
                    "maxSources": 14,
                    "maxSourcesPerQuestion": 5,
                    "searchResultsPerQuery": 6,
                    "sourceDiversity": true,
                    "reportLength": "long",
                    "includeSessionMemory": true,
                    "sessionMemoryLimit": 3,
                    "summarizerSourceLimit": 7
                }
            }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "started");
        assert!(body["session_id"].is_string());
        assert_eq!(body["options"]["max_iterations"], 4);
        assert!(body["stream_url"].as_str().unwrap().ends_with("/events"));
        assert!(body["stop_url"].as_str().unwrap().ends_with("/stop"));
    }

    #[tokio::test]
    async fn test_start_rejects_short_query() {
        let (server, _temp_dir) = setup_server().await;

        let response = server
            .post("/api/research/start")
            .json(&json!({ "query": "x" }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_query");
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_options() {
        let (server, _temp_dir) = setup_server().await;

        let response = server
            .post("/api/research/start")
            .json(&json!({
                "query": "a valid query",
                "options": { "maxIterations": 11 }
            }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_options");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("max_iterations"));

        // No session was created.
        let sessions: Value = server.get("/api/research/sessions").await.json();
        assert_eq!(sessions["count"], 0);
    }
}

mod session_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_completed_session_exposes_report_and_documents() {
        let (server, _temp_dir) = setup_server().await;

        let start: Value = server
            .post("/api/research/start")
            .json(&json!({ "query": "AI governance updates" }))
            .await
            .json();
        let session_id = start["session_id"].as_str().unwrap().to_string();

        let status = wait_for_status(&server, &session_id, "completed").await;
        assert_eq!(status["has_report"], true);

        let sessions: Value = server.get("/api/research/sessions").await.json();
        assert_eq!(sessions["status"], "success");
        assert_eq!(sessions["count"], 1);
        assert_eq!(sessions["sessions"][0]["has_report"], true);

        let report: Value = server
            .get(&format!("/api/research/sessions/{session_id}/report"))
            .await
            .json();
        assert!(report["report"]["title"]
            .as_str()
            .unwrap()
            .contains("AI governance updates"));

        let docs_response = server
            .get(&format!("/api/research/sessions/{session_id}/documents"))
            .await;
        docs_response.assert_status_ok();
        let docs: Value = docs_response.json();
        let doc_types: Vec<&str> = docs["documents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["doc_type"].as_str().unwrap())
            .collect();
        assert!(doc_types.contains(&"report_json"));
        assert!(doc_types.contains(&"report_markdown"));

        let markdown_id = format!("{session_id}-markdown");
        let document: Value = server
            .get(&format!(
                "/api/research/sessions/{session_id}/documents/{markdown_id}"
            ))
            .await
            .json();
        assert!(document["content"].as_str().unwrap().starts_with("# "));

        let missing = server
            .get(&format!(
                "/api/research/sessions/{session_id}/documents/does-not-exist"
            ))
            .await;
        missing.assert_status_not_found();
    }

    #[tokio::test]
    async fn test_report_missing_for_stopped_session() {
        let (server, _temp_dir) = setup_server_with_agents(blocked_agents()).await;

        let start: Value = server
            .post("/api/research/start")
            .json(&json!({ "query": "a query to stop" }))
            .await
            .json();
        let session_id = start["session_id"].as_str().unwrap().to_string();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stop: Value = server
            .post(&format!("/api/research/{session_id}/stop"))
            .await
            .json();
        assert_eq!(stop["status"], "stopped");

        wait_for_status(&server, &session_id, "stopped").await;

        let report = server
            .get(&format!("/api/research/sessions/{session_id}/report"))
            .await;
        report.assert_status_not_found();
    }

    #[tokio::test]
    async fn test_stop_terminal_session_reports_already_terminal() {
        let (server, _temp_dir) = setup_server().await;

        let start: Value = server
            .post("/api/research/start")
            .json(&json!({ "query": "quick research run" }))
            .await
            .json();
        let session_id = start["session_id"].as_str().unwrap().to_string();
        wait_for_status(&server, &session_id, "completed").await;

        let stop: Value = server
            .post(&format!("/api/research/{session_id}/stop"))
            .await
            .json();
        assert_eq!(stop["status"], "already_terminal");

        // Idempotent: a second stop reports the same outcome.
        let again: Value = server
            .post(&format!("/api/research/{session_id}/stop"))
            .await
            .json();
        assert_eq!(again["status"], "already_terminal");
    }

    #[tokio::test]
    async fn test_unknown_session_returns_404() {
        let (server, _temp_dir) = setup_server().await;
        let fake_id = uuid::Uuid::new_v4();

        server
            .get(&format!("/api/research/{fake_id}/status"))
            .await
            .assert_status_not_found();
        server
            .post(&format!("/api/research/{fake_id}/stop"))
            .await
            .assert_status_not_found();
        // No stream is opened for an unknown id.
        server
            .get(&format!("/api/research/{fake_id}/events"))
            .await
            .assert_status_not_found();
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn test_delete_contract() {
        let (server, _temp_dir) = setup_server().await;

        let start: Value = server
            .post("/api/research/start")
            .json(&json!({ "query": "deletable session" }))
            .await
            .json();
        let session_id = start["session_id"].as_str().unwrap().to_string();
        wait_for_status(&server, &session_id, "completed").await;

        let deleted: Value = server
            .delete(&format!("/api/research/sessions/{session_id}"))
            .await
            .json();
        assert_eq!(deleted["status"], "deleted");

        server
            .delete(&format!("/api/research/sessions/{session_id}"))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_delete_refused_while_running() {
        let (server, _temp_dir) = setup_server_with_agents(blocked_agents()).await;

        let start: Value = server
            .post("/api/research/start")
            .json(&json!({ "query": "long running session" }))
            .await
            .json();
        let session_id = start["session_id"].as_str().unwrap().to_string();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = server
            .delete(&format!("/api/research/sessions/{session_id}"))
            .await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "session_active");

        server
            .post(&format!("/api/research/{session_id}/stop"))
            .await
            .assert_status_ok();
        wait_for_status(&server, &session_id, "stopped").await;

        let deleted: Value = server
            .delete(&format!("/api/research/sessions/{session_id}"))
            .await
            .json();
        assert_eq!(deleted["status"], "deleted");
    }
}
