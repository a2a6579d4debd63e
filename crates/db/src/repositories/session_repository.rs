use chrono::Utc;
use research_core::{MemoryEntry, Report, ResearchSnapshot, Session, SessionStatus, Stage};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{datetime_to_timestamp, timestamp_to_datetime, SessionRow};

use super::TERMINAL_STATUSES;

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<Session, DbError> {
        let row = SessionRow::from(session);

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, query, status, current_stage, iteration, summarizer_retries,
                options_json, state_json, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, '{}', ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.query)
        .bind(&row.status)
        .bind(&row.current_stage)
        .bind(row.iteration)
        .bind(row.summarizer_retries)
        .bind(&row.options_json)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(session.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, DbError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, query, status, current_stage, iteration, summarizer_retries,
                   options_json, final_report_json, error, created_at, updated_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    pub async fn find_all(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, query, status, current_stage, iteration, summarizer_retries,
                   options_json, final_report_json, error, created_at, updated_at
            FROM sessions
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Sessions persisted as active; after a restart these are the
    /// candidates for recovery.
    pub async fn find_running(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, query, status, current_stage, iteration, summarizer_retries,
                   options_json, final_report_json, error, created_at, updated_at
            FROM sessions
            WHERE status IN ('pending', 'running')
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Update the session status, refusing to overwrite a terminal status.
    ///
    /// Returns `true` when the row changed, `false` when the session is
    /// already terminal. Unknown ids are an error.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: SessionStatus,
        error: Option<&str>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(&format!(
            "UPDATE sessions SET status = ?, error = COALESCE(?, error), updated_at = ? \
             WHERE id = ? AND status NOT IN {TERMINAL_STATUSES}"
        ))
        .bind(status.as_str())
        .bind(error)
        .bind(datetime_to_timestamp(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.find_by_id(id).await?.is_some() {
            Ok(false)
        } else {
            Err(DbError::SessionNotFound(id))
        }
    }

    /// Persist the engine's accumulated state after a committed stage.
    pub async fn save_snapshot(
        &self,
        id: Uuid,
        stage: Stage,
        snapshot: &ResearchSnapshot,
    ) -> Result<(), DbError> {
        let state_json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET current_stage = ?, iteration = ?, summarizer_retries = ?,
                state_json = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(stage.as_str())
        .bind(snapshot.iteration as i64)
        .bind(snapshot.summarizer_retries as i64)
        .bind(state_json)
        .bind(datetime_to_timestamp(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recent completed report summaries used as planner memory context.
    pub async fn recent_completed(
        &self,
        limit: u32,
        exclude: Uuid,
    ) -> Result<Vec<MemoryEntry>, DbError> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, query, final_report_json, updated_at
            FROM sessions
            WHERE status = 'completed'
              AND final_report_json IS NOT NULL
              AND id != ?
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(exclude.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, query, report_json, updated_at) in rows {
            let report: Report = match serde_json::from_str(&report_json) {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Skipping unreadable report");
                    continue;
                }
            };
            entries.push(MemoryEntry {
                session_id: Uuid::parse_str(&id).unwrap_or_default(),
                query,
                title: report.title,
                executive_summary: report.executive_summary,
                sources_count: report.sources_used.len(),
                updated_at: timestamp_to_datetime(updated_at),
            });
        }
        Ok(entries)
    }

    /// Delete a session and all associated events and documents.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_documents WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_events WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
