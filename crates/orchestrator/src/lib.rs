//! Pipeline orchestration for research sessions.
//!
//! The engine drives one session's stage graph to completion, termination,
//! or cancellation; the manager owns task lifetimes and the public session
//! operations; the event log makes every state change durable and
//! streamable.

pub mod agents;
mod engine;
mod error;
mod event_log;
mod manager;
pub mod state_machine;

pub use engine::{EngineConfig, PipelineEngine};
pub use error::{OrchestratorError, Result};
pub use event_log::{EventLogRegistry, SessionEventLog};
pub use manager::{ManagerConfig, RecoveryPolicy, SessionManager, StopOutcome};
pub use state_machine::{advance, reviewer_decision, Next, SUMMARIZER_RETRY_MAX};
