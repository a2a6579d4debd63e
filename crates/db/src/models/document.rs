use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::timestamp_to_datetime;

pub const DOC_TYPE_JSON: &str = "report_json";
pub const DOC_TYPE_MARKDOWN: &str = "report_markdown";

/// Persisted final-output document for a session.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub session_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub session_id: String,
    pub doc_type: String,
    pub title: String,
    pub content: String,
    pub metadata_json: String,
    pub created_at: i64,
}

impl DocumentRow {
    pub fn into_domain(self) -> Document {
        Document {
            id: self.id,
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            doc_type: self.doc_type,
            title: self.title,
            content: self.content,
            metadata: serde_json::from_str(&self.metadata_json)
                .unwrap_or(serde_json::Value::Null),
            created_at: timestamp_to_datetime(self.created_at),
        }
    }
}
