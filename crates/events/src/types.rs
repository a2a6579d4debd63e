use chrono::{DateTime, Utc};
use research_core::{Report, ResearchOptions, SessionStatus, Source};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Reviewer routing decision carried on `reviewer_complete`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Finish,
    Iterate,
}

/// All event kinds streamed for a research session.
///
/// Pipeline events are appended to the per-session log with gap-free
/// sequence numbers; `connected`, `heartbeat`, and `done` are synthesized by
/// the stream transport and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Connected {
        status: SessionStatus,
    },
    ResearchStarted {
        query: String,
        options: ResearchOptions,
    },
    PlannerRunning {
        message: String,
    },
    PlannerComplete {
        sub_questions_count: usize,
        questions: Vec<String>,
    },
    FinderRunning {
        message: String,
    },
    FinderSource {
        source: Source,
        sources_so_far: usize,
    },
    FinderComplete {
        sources_count: usize,
        domains_count: usize,
    },
    SummarizerRunning {
        message: String,
    },
    SummarizerComplete {
        findings_count: usize,
        key_facts_count: usize,
    },
    ReviewerRunning {
        message: String,
    },
    ReviewerComplete {
        gaps_found: usize,
        confidence: f64,
        next_action: NextAction,
    },
    WriterRunning {
        message: String,
    },
    WriterComplete {
        word_count: u32,
        sources_cited: usize,
    },
    ResearchCompleted {
        title: String,
        word_count: u32,
        iterations: u32,
        report: Report,
    },
    ResearchStopped,
    ResearchError {
        error: String,
    },
    Heartbeat,
    Done,
}

impl EventKind {
    /// Wire name, also used as the SSE event type.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ResearchStarted { .. } => "research_started",
            Self::PlannerRunning { .. } => "planner_running",
            Self::PlannerComplete { .. } => "planner_complete",
            Self::FinderRunning { .. } => "finder_running",
            Self::FinderSource { .. } => "finder_source",
            Self::FinderComplete { .. } => "finder_complete",
            Self::SummarizerRunning { .. } => "summarizer_running",
            Self::SummarizerComplete { .. } => "summarizer_complete",
            Self::ReviewerRunning { .. } => "reviewer_running",
            Self::ReviewerComplete { .. } => "reviewer_complete",
            Self::WriterRunning { .. } => "writer_running",
            Self::WriterComplete { .. } => "writer_complete",
            Self::ResearchCompleted { .. } => "research_completed",
            Self::ResearchStopped => "research_stopped",
            Self::ResearchError { .. } => "research_error",
            Self::Heartbeat => "heartbeat",
            Self::Done => "done",
        }
    }

    /// Whether this event ends the pipeline's event log.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ResearchCompleted { .. } | Self::ResearchStopped | Self::ResearchError { .. }
        )
    }
}

/// Ordered, persisted record of one pipeline state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub session_id: Uuid,
    /// Strictly increasing, gap-free per session; 0 for synthetic events.
    pub sequence_no: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: EventKind,
}

impl TraceEvent {
    pub fn new(session_id: Uuid, sequence_no: u64, event: EventKind) -> Self {
        Self {
            session_id,
            sequence_no,
            timestamp: Utc::now(),
            event,
        }
    }

    /// A transport-synthesized event, outside the persisted sequence.
    pub fn synthetic(session_id: Uuid, event: EventKind) -> Self {
        Self::new(session_id, 0, event)
    }

    /// Fold an ordered event slice into the session status it implies.
    ///
    /// Events are the source of truth for "what happened, in what order":
    /// replaying the full log must reconstruct the stored status.
    pub fn replay_status(events: &[TraceEvent]) -> Option<SessionStatus> {
        let mut status = None;
        for event in events {
            status = Some(match event.event {
                EventKind::ResearchStarted { .. } => SessionStatus::Running,
                EventKind::ResearchCompleted { .. } => SessionStatus::Completed,
                EventKind::ResearchStopped => SessionStatus::Stopped,
                EventKind::ResearchError { .. } => SessionStatus::Error,
                _ => match status {
                    Some(s) => s,
                    None => SessionStatus::Running,
                },
            });
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = TraceEvent::new(
            Uuid::new_v4(),
            3,
            EventKind::ReviewerComplete {
                gaps_found: 2,
                confidence: 0.8,
                next_action: NextAction::Iterate,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"reviewer_complete\""));
        assert!(json.contains("\"next_action\":\"iterate\""));
        assert!(json.contains("\"sequence_no\":3"));
    }

    #[test]
    fn test_event_deserialization() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"session_id":"{id}","sequence_no":1,"timestamp":"2026-02-11T12:00:00Z","type":"planner_complete","sub_questions_count":2,"questions":["a","b"]}}"#
        );
        let event: TraceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.sequence_no, 1);
        match event.event {
            EventKind::PlannerComplete {
                sub_questions_count,
                ref questions,
            } => {
                assert_eq!(sub_questions_count, 2);
                assert_eq!(questions.len(), 2);
            }
            _ => panic!("wrong event kind"),
        }
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(EventKind::ResearchStopped.is_terminal());
        assert!(EventKind::ResearchError {
            error: "boom".to_string()
        }
        .is_terminal());
        assert!(!EventKind::Heartbeat.is_terminal());
        assert!(!EventKind::PlannerRunning {
            message: String::new()
        }
        .is_terminal());
    }

    #[test]
    fn test_replay_status_reconstructs_lifecycle() {
        let id = Uuid::new_v4();
        let mut events = vec![
            TraceEvent::new(
                id,
                1,
                EventKind::ResearchStarted {
                    query: "q".to_string(),
                    options: ResearchOptions::default(),
                },
            ),
            TraceEvent::new(
                id,
                2,
                EventKind::PlannerRunning {
                    message: "planning".to_string(),
                },
            ),
        ];
        assert_eq!(
            TraceEvent::replay_status(&events),
            Some(SessionStatus::Running)
        );

        events.push(TraceEvent::new(id, 3, EventKind::ResearchStopped));
        assert_eq!(
            TraceEvent::replay_status(&events),
            Some(SessionStatus::Stopped)
        );

        assert_eq!(TraceEvent::replay_status(&[]), None);
    }
}
