//! Session lifecycle management.
//!
//! The manager is the public entry point: it validates and creates
//! sessions, launches exactly one engine task per session, signals
//! cooperative cancellation, serves read-only status queries, and applies
//! the configured recovery policy to sessions left `running` by a crash.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use db::{Document, DocumentRepository, EventRepository, SessionRepository};
use events::EventKind;
use research_core::{MemoryEntry, Report, ResearchOptions, Session, SessionStatus};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::AgentSet;
use crate::engine::{EngineConfig, PipelineEngine};
use crate::error::{OrchestratorError, Result};
use crate::event_log::{EventLogRegistry, SessionEventLog};

/// What to do with sessions persisted as `running` when no task is attached
/// (i.e. after a process restart). Stage execution is never auto-resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    #[default]
    MarkStopped,
    MarkError,
}

impl RecoveryPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mark_stopped" => Some(Self::MarkStopped),
            "mark_error" => Some(Self::MarkError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub engine: EngineConfig,
    pub recovery: RecoveryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyTerminal,
}

const QUERY_MIN_LEN: usize = 3;
const QUERY_MAX_LEN: usize = 2000;

pub struct SessionManager {
    sessions: SessionRepository,
    documents: DocumentRepository,
    registry: EventLogRegistry,
    agents: AgentSet,
    active: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    config: ManagerConfig,
}

impl SessionManager {
    pub fn new(pool: SqlitePool, agents: AgentSet, config: ManagerConfig) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            documents: DocumentRepository::new(pool.clone()),
            registry: EventLogRegistry::new().with_repository(EventRepository::new(pool)),
            agents,
            active: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Create a session and launch its pipeline task.
    ///
    /// Validation failures leave no trace: no row is created and no task is
    /// spawned.
    pub async fn start(&self, query: &str, options: ResearchOptions) -> Result<Session> {
        let query = query.trim();
        if query.len() < QUERY_MIN_LEN || query.len() > QUERY_MAX_LEN {
            return Err(OrchestratorError::InvalidQuery(format!(
                "query length must be between {QUERY_MIN_LEN} and {QUERY_MAX_LEN} characters"
            )));
        }
        options.validate()?;

        let mut session = Session::new(query, options.clone());
        self.sessions.create(&session).await?;
        self.sessions
            .update_status(session.id, SessionStatus::Running, None)
            .await?;
        session.status = SessionStatus::Running;

        let log = self.registry.get_or_create(session.id);
        let memory = self.session_memory(&options, session.id).await;

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.write().unwrap();
            if active.contains_key(&session.id) {
                return Err(OrchestratorError::SessionActive(session.id));
            }
            active.insert(session.id, cancel.clone());
        }

        let engine = PipelineEngine::new(
            session.id,
            options,
            self.agents.clone(),
            log,
            self.sessions.clone(),
            self.documents.clone(),
            cancel,
            self.config.engine.clone(),
        );

        let active = Arc::clone(&self.active);
        let session_id = session.id;
        let task_query = query.to_string();
        tokio::spawn(async move {
            let status = engine.run(task_query, memory).await;
            info!(
                session_id = %session_id,
                status = status.as_str(),
                "Research session finished"
            );
            active.write().unwrap().remove(&session_id);
        });

        info!(session_id = %session.id, query = %session.query, "Started research session");
        Ok(session)
    }

    /// Signal cooperative cancellation. Idempotent: stopping an already
    /// terminal session reports `AlreadyTerminal` rather than failing.
    pub async fn stop(&self, id: Uuid) -> Result<StopOutcome> {
        let token = self.active.read().unwrap().get(&id).cloned();
        if let Some(token) = token {
            token.cancel();
            info!(session_id = %id, "Stop requested");
            return Ok(StopOutcome::Stopped);
        }

        let session = self
            .sessions
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(id))?;
        if session.status.is_terminal() {
            return Ok(StopOutcome::AlreadyTerminal);
        }

        // Persisted as active but no task attached (crash leftover):
        // finalize as stopped so the log and the row agree.
        let log = self.registry.get_or_create_with_history(id).await;
        if let Err(e) = log.append(EventKind::ResearchStopped).await {
            warn!(session_id = %id, error = %e, "Failed to append stop event");
        }
        self.sessions
            .update_status(id, SessionStatus::Stopped, None)
            .await?;
        Ok(StopOutcome::Stopped)
    }

    /// Read-only session lookup; never blocks on pipeline execution.
    pub async fn status(&self, id: Uuid) -> Result<Session> {
        self.sessions
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.find_all().await?)
    }

    /// Delete a session and its events and documents.
    ///
    /// Refused with `SessionActive` while the pipeline is running.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(id))?;

        let is_active = self.active.read().unwrap().contains_key(&id);
        if is_active || session.status == SessionStatus::Running {
            return Err(OrchestratorError::SessionActive(id));
        }

        if !self.sessions.delete(id).await? {
            return Err(OrchestratorError::SessionNotFound(id));
        }
        self.registry.remove(&id);
        info!(session_id = %id, "Deleted session");
        Ok(())
    }

    /// The structured final report, if the session has completed.
    pub async fn report(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.documents.final_report(id).await?)
    }

    pub async fn documents(&self, id: Uuid) -> Result<Vec<Document>> {
        self.status(id).await?;
        Ok(self.documents.list(id).await?)
    }

    pub async fn document(&self, id: Uuid, document_id: &str) -> Result<Document> {
        self.status(id).await?;
        self.documents
            .find(id, document_id)
            .await?
            .ok_or_else(|| OrchestratorError::DocumentNotFound(document_id.to_string()))
    }

    /// Event log handle for streaming, hydrated from storage if needed.
    pub async fn event_log(&self, id: Uuid) -> Arc<SessionEventLog> {
        self.registry.get_or_create_with_history(id).await
    }

    /// Finalize sessions left `running` with no attached task.
    ///
    /// Called once on process start; the policy decides between `stopped`
    /// and `error`, and the matching terminal event is appended so replaying
    /// the log still reconstructs the stored status.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let candidates = self.sessions.find_running().await?;
        let mut recovered = 0;

        for session in candidates {
            if self.active.read().unwrap().contains_key(&session.id) {
                continue;
            }

            let (status, kind, error) = match self.config.recovery {
                RecoveryPolicy::MarkStopped => {
                    (SessionStatus::Stopped, EventKind::ResearchStopped, None)
                }
                RecoveryPolicy::MarkError => (
                    SessionStatus::Error,
                    EventKind::ResearchError {
                        error: "interrupted by process restart".to_string(),
                    },
                    Some("interrupted by process restart"),
                ),
            };

            let log = self.registry.get_or_create_with_history(session.id).await;
            if let Err(e) = log.append(kind).await {
                warn!(session_id = %session.id, error = %e, "Failed to append recovery event");
            }
            self.sessions
                .update_status(session.id, status, error)
                .await?;

            info!(
                session_id = %session.id,
                status = status.as_str(),
                "Recovered interrupted session"
            );
            recovered += 1;
        }

        Ok(recovered)
    }

    async fn session_memory(&self, options: &ResearchOptions, exclude: Uuid) -> Vec<MemoryEntry> {
        if !options.include_session_memory || options.session_memory_limit == 0 {
            return vec![];
        }
        match self
            .sessions
            .recent_completed(options.session_memory_limit, exclude)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to load session memory");
                vec![]
            }
        }
    }
}
