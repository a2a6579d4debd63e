use research_core::{Session, SessionStatus, Stage};
use uuid::Uuid;

use super::{datetime_to_timestamp, timestamp_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub query: String,
    pub status: String,
    pub current_stage: Option<String>,
    pub iteration: i64,
    pub summarizer_retries: i64,
    pub options_json: String,
    pub final_report_json: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SessionRow {
    pub fn into_domain(self) -> Session {
        Session {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            query: self.query,
            status: SessionStatus::parse(&self.status).unwrap_or_default(),
            current_stage: self.current_stage.as_deref().and_then(Stage::parse),
            iteration: self.iteration as u32,
            summarizer_retries: self.summarizer_retries as u32,
            options: serde_json::from_str(&self.options_json).unwrap_or_default(),
            error: self.error,
            has_report: self.final_report_json.is_some(),
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        }
    }
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            query: session.query.clone(),
            status: session.status.as_str().to_string(),
            current_stage: session.current_stage.map(|s| s.as_str().to_string()),
            iteration: session.iteration as i64,
            summarizer_retries: session.summarizer_retries as i64,
            options_json: serde_json::to_string(&session.options)
                .unwrap_or_else(|_| "{}".to_string()),
            final_report_json: None,
            error: session.error.clone(),
            created_at: datetime_to_timestamp(session.created_at),
            updated_at: datetime_to_timestamp(session.updated_at),
        }
    }
}
