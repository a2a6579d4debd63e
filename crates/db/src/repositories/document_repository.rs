use chrono::Utc;
use research_core::Report;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{datetime_to_timestamp, Document, DocumentRow, DOC_TYPE_JSON, DOC_TYPE_MARKDOWN};

use super::TERMINAL_STATUSES;

/// Storage for final-output documents.
///
/// The structured and rendered documents are written in the same
/// transaction that moves the session to `completed`, so a completed
/// session always has both.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Atomically mark the session `completed` and persist both documents.
    ///
    /// Returns `false` without writing anything if the session is already
    /// terminal (e.g. a stop raced the final commit).
    pub async fn save_final_report(
        &self,
        session_id: Uuid,
        report: &Report,
        markdown: &str,
    ) -> Result<bool, DbError> {
        let report_json = serde_json::to_string(report)?;
        let metadata = serde_json::json!({
            "word_count": report.word_count,
            "sources_count": report.sources_used.len(),
            "generated_by": "writer",
        })
        .to_string();
        let now = datetime_to_timestamp(Utc::now());
        let id = session_id.to_string();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            "UPDATE sessions SET status = 'completed', final_report_json = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN {TERMINAL_STATUSES}"
        ))
        .bind(&report_json)
        .bind(now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            if sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
                .bind(&id)
                .fetch_optional(&self.pool)
                .await?
                .is_none()
            {
                return Err(DbError::SessionNotFound(session_id));
            }
            return Ok(false);
        }

        for (doc_type, content) in [(DOC_TYPE_JSON, report_json.as_str()), (DOC_TYPE_MARKDOWN, markdown)] {
            let suffix = if doc_type == DOC_TYPE_JSON { "json" } else { "markdown" };
            sqlx::query(
                r#"
                INSERT INTO session_documents (id, session_id, doc_type, title, content, metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    metadata_json = excluded.metadata_json,
                    created_at = excluded.created_at
                "#,
            )
            .bind(format!("{id}-{suffix}"))
            .bind(&id)
            .bind(doc_type)
            .bind(&report.title)
            .bind(content)
            .bind(&metadata)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list(&self, session_id: Uuid) -> Result<Vec<Document>, DbError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, doc_type, title, content, metadata_json, created_at
            FROM session_documents
            WHERE session_id = ?
            ORDER BY doc_type ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn find(
        &self,
        session_id: Uuid,
        document_id: &str,
    ) -> Result<Option<Document>, DbError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, doc_type, title, content, metadata_json, created_at
            FROM session_documents
            WHERE session_id = ? AND id = ?
            "#,
        )
        .bind(session_id.to_string())
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    /// The structured final report, if the session completed.
    pub async fn final_report(&self, session_id: Uuid) -> Result<Option<Report>, DbError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT final_report_json FROM sessions WHERE id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Err(DbError::SessionNotFound(session_id)),
            Some((None,)) => Ok(None),
            Some((Some(json),)) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }
}
