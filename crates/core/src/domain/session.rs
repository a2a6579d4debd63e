use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ResearchOptions;

/// One unit of pipeline work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planner,
    Finder,
    Summarizer,
    Reviewer,
    Writer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Finder => "finder",
            Self::Summarizer => "summarizer",
            Self::Reviewer => "reviewer",
            Self::Writer => "writer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planner" => Some(Self::Planner),
            "finder" => Some(Self::Finder),
            "summarizer" => Some(Self::Summarizer),
            "reviewer" => Some(Self::Reviewer),
            "writer" => Some(Self::Writer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Stopped,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Terminal statuses are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

/// Durable record of one end-to-end research run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub query: String,
    pub status: SessionStatus,
    /// Most recently executed pipeline stage, if any.
    pub current_stage: Option<Stage>,
    /// Planner→Reviewer cycles run so far (1-based once the planner starts).
    pub iteration: u32,
    /// Finder retries triggered by zero-fact summarizer passes.
    pub summarizer_retries: u32,
    pub options: ResearchOptions,
    pub error: Option<String>,
    pub has_report: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(query: impl Into<String>, options: ResearchOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            status: SessionStatus::Pending,
            current_stage: None,
            iteration: 0,
            summarizer_retries: 0,
            options,
            error: None,
            has_report: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new("quantum computing", ResearchOptions::default());
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.iteration, 0);
        assert!(session.current_stage.is_none());
        assert!(!session.has_report);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Stopped,
            SessionStatus::Error,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
    }

    #[test]
    fn test_stage_roundtrip() {
        for stage in [
            Stage::Planner,
            Stage::Finder,
            Stage::Summarizer,
            Stage::Reviewer,
            Stage::Writer,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
    }
}
