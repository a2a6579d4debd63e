//! Durable per-session event log.
//!
//! Combines the in-memory [`SessionSink`] with the database-backed
//! [`EventRepository`]: sequence assignment and persistence happen under one
//! per-session lock, so the stored log is always gap-free and ordered, and
//! subscribers observe events only after they are durable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use db::{DbError, EventRepository};
use events::{EventKind, SessionSink, TraceEvent};
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct SessionEventLog {
    sink: SessionSink,
    repository: Option<EventRepository>,
    append_lock: tokio::sync::Mutex<()>,
}

impl SessionEventLog {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            sink: SessionSink::new(session_id),
            repository: None,
            append_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_repository(mut self, repository: EventRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.sink.session_id()
    }

    /// Load persisted events into the in-memory history (restart path).
    pub async fn load_from_db(&self) -> Result<usize, DbError> {
        let Some(ref repo) = self.repository else {
            return Ok(0);
        };
        let _guard = self.append_lock.lock().await;
        let persisted = repo.list_from(self.session_id(), 0).await?;
        let count = persisted.len();
        if self.sink.history_len() < count {
            self.sink.hydrate(persisted);
        }
        Ok(count)
    }

    /// Assign the next sequence number, persist, then publish.
    ///
    /// If the durable write fails nothing is published, so memory and
    /// storage can never disagree about the sequence.
    pub async fn append(&self, kind: EventKind) -> Result<TraceEvent, DbError> {
        let _guard = self.append_lock.lock().await;
        let event = TraceEvent::new(self.session_id(), self.sink.next_sequence(), kind);
        if let Some(ref repo) = self.repository {
            repo.append(&event).await?;
        }
        self.sink.publish(event.clone());
        Ok(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.sink.subscribe()
    }

    pub fn events_after(&self, after: u64) -> Vec<TraceEvent> {
        self.sink.events_after(after)
    }

    pub fn last_sequence(&self) -> u64 {
        self.sink.last_sequence()
    }

    pub fn history_len(&self) -> usize {
        self.sink.history_len()
    }
}

/// Process-wide map of live session event logs.
#[derive(Clone, Default)]
pub struct EventLogRegistry {
    logs: Arc<RwLock<HashMap<Uuid, Arc<SessionEventLog>>>>,
    repository: Option<EventRepository>,
}

impl EventLogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, repository: EventRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    fn build_log(&self, session_id: Uuid) -> SessionEventLog {
        match self.repository {
            Some(ref repo) => SessionEventLog::new(session_id).with_repository(repo.clone()),
            None => SessionEventLog::new(session_id),
        }
    }

    pub fn get_or_create(&self, session_id: Uuid) -> Arc<SessionEventLog> {
        {
            let logs = self.logs.read().unwrap();
            if let Some(log) = logs.get(&session_id) {
                return Arc::clone(log);
            }
        }

        let mut logs = self.logs.write().unwrap();
        if let Some(log) = logs.get(&session_id) {
            return Arc::clone(log);
        }
        let log = Arc::new(self.build_log(session_id));
        logs.insert(session_id, Arc::clone(&log));
        log
    }

    /// Get or create a log, hydrating persisted history on first access.
    pub async fn get_or_create_with_history(&self, session_id: Uuid) -> Arc<SessionEventLog> {
        {
            let logs = self.logs.read().unwrap();
            if let Some(log) = logs.get(&session_id) {
                return Arc::clone(log);
            }
        }

        let log = Arc::new(self.build_log(session_id));
        if let Err(e) = log.load_from_db().await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to load event history");
        }

        let mut logs = self.logs.write().unwrap();
        if let Some(existing) = logs.get(&session_id) {
            return Arc::clone(existing);
        }
        logs.insert(session_id, Arc::clone(&log));
        log
    }

    pub fn get(&self, session_id: &Uuid) -> Option<Arc<SessionEventLog>> {
        self.logs.read().unwrap().get(session_id).cloned()
    }

    pub fn remove(&self, session_id: &Uuid) -> Option<Arc<SessionEventLog>> {
        self.logs.write().unwrap().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.logs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::{create_pool, run_migrations, SessionRepository};
    use research_core::{ResearchOptions, Session, SessionStatus};
    use sqlx::SqlitePool;

    async fn setup() -> (SqlitePool, Session) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let session = Session::new("q", ResearchOptions::default());
        SessionRepository::new(pool.clone())
            .create(&session)
            .await
            .unwrap();
        (pool, session)
    }

    #[tokio::test]
    async fn test_append_assigns_sequence_and_persists() {
        let (pool, session) = setup().await;
        let repo = EventRepository::new(pool);
        let log = SessionEventLog::new(session.id).with_repository(repo.clone());

        let first = log
            .append(EventKind::PlannerRunning {
                message: "m".to_string(),
            })
            .await
            .unwrap();
        let second = log.append(EventKind::ResearchStopped).await.unwrap();

        assert_eq!(first.sequence_no, 1);
        assert_eq!(second.sequence_no, 2);
        assert_eq!(repo.count(session.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_registry_hydrates_after_restart() {
        let (pool, session) = setup().await;
        let repo = EventRepository::new(pool);

        {
            let registry = EventLogRegistry::new().with_repository(repo.clone());
            let log = registry.get_or_create(session.id);
            log.append(EventKind::PlannerRunning {
                message: "m".to_string(),
            })
            .await
            .unwrap();
            log.append(EventKind::ResearchStopped).await.unwrap();
        }

        // A fresh registry simulates a process restart.
        let registry = EventLogRegistry::new().with_repository(repo);
        let log = registry.get_or_create_with_history(session.id).await;

        assert_eq!(log.history_len(), 2);
        assert_eq!(log.last_sequence(), 2);

        // Appends continue the persisted sequence without gaps.
        let next = log.append(EventKind::ResearchStopped).await.unwrap();
        assert_eq!(next.sequence_no, 3);
    }

    #[tokio::test]
    async fn test_replay_matches_status() {
        let (pool, session) = setup().await;
        let sessions = SessionRepository::new(pool.clone());
        let log = SessionEventLog::new(session.id).with_repository(EventRepository::new(pool));

        log.append(EventKind::ResearchStarted {
            query: "q".to_string(),
            options: ResearchOptions::default(),
        })
        .await
        .unwrap();
        log.append(EventKind::ResearchStopped).await.unwrap();
        sessions
            .update_status(session.id, SessionStatus::Stopped, None)
            .await
            .unwrap();

        let stored = sessions.find_by_id(session.id).await.unwrap().unwrap();
        let replayed = TraceEvent::replay_status(&log.events_after(0)).unwrap();
        assert_eq!(replayed, stored.status);
    }

    #[tokio::test]
    async fn test_registry_get_or_create_is_idempotent() {
        let registry = EventLogRegistry::new();
        let id = Uuid::new_v4();

        let a = registry.get_or_create(id);
        let b = registry.get_or_create(id);
        assert_eq!(a.session_id(), b.session_id());
        assert_eq!(registry.len(), 1);

        registry.remove(&id);
        assert!(registry.is_empty());
    }
}
