use chrono::Utc;
use events::TraceEvent;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::datetime_to_timestamp;

/// Durable backing for the per-session event log.
///
/// Appends are serialized per session by the caller; the
/// `(session_id, sequence_no)` primary key rejects accidental duplicates.
#[derive(Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, event: &TraceEvent) -> Result<(), DbError> {
        let payload_json = serde_json::to_string(event)?;
        let created_at = datetime_to_timestamp(event.timestamp);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO session_events (session_id, sequence_no, event_type, payload_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.session_id.to_string())
        .bind(event.sequence_no as i64)
        .bind(event.event.kind_str())
        .bind(payload_json)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(datetime_to_timestamp(Utc::now()))
            .bind(event.session_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Events with `sequence_no > after`, in order.
    pub async fn list_from(
        &self,
        session_id: Uuid,
        after: u64,
    ) -> Result<Vec<TraceEvent>, DbError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT payload_json
            FROM session_events
            WHERE session_id = ? AND sequence_no > ?
            ORDER BY sequence_no ASC
            "#,
        )
        .bind(session_id.to_string())
        .bind(after as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut parsed = Vec::with_capacity(rows.len());
        for (payload,) in rows {
            match serde_json::from_str::<TraceEvent>(&payload) {
                Ok(event) => parsed.push(event),
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Skipping unreadable event");
                }
            }
        }
        Ok(parsed)
    }

    pub async fn count(&self, session_id: Uuid) -> Result<u64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM session_events WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::SessionRepository;
    use crate::{create_pool, run_migrations};
    use events::EventKind;
    use research_core::{ResearchOptions, Session};

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
    async fn test_append_and_list_preserve_order() {
        let (pool, session) = setup().await;
        let repo = EventRepository::new(pool);

        for seq in 1..=3u64 {
            let event = TraceEvent::new(
                session.id,
                seq,
                EventKind::PlannerRunning {
                    message: format!("pass {seq}"),
                },
            );
            repo.append(&event).await.unwrap();
        }

        let events = repo.list_from(session.id, 0).await.unwrap();
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence_no).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_from_cursor_excludes_seen() {
        let (pool, session) = setup().await;
        let repo = EventRepository::new(pool);

        for seq in 1..=4u64 {
            repo.append(&TraceEvent::new(session.id, seq, EventKind::ResearchStopped))
                .await
                .unwrap();
        }

        let tail = repo.list_from(session.id, 2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail.iter().all(|e| e.sequence_no > 2));
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rejected() {
        let (pool, session) = setup().await;
        let repo = EventRepository::new(pool);

        let event = TraceEvent::new(session.id, 1, EventKind::Heartbeat);
        repo.append(&event).await.unwrap();
        assert!(repo.append(&event).await.is_err());
        assert_eq!(repo.count(session.id).await.unwrap(), 1);
    }
}
