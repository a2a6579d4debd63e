//! Stage adapter seam.
//!
//! Each pipeline stage delegates its semantic content (query decomposition,
//! retrieval, summarization, gap judgment, report writing) to an external
//! adapter behind one of these traits. Inputs are built strictly from the
//! accumulated snapshot of earlier stages — never from future iterations.

mod offline;

pub use offline::OfflineAgents;

use std::sync::Arc;

use async_trait::async_trait;
use research_core::{
    Finding, FindingSet, GapReport, MemoryEntry, Plan, Report, ReportLength, ResearchOptions,
    Source, SourceSet, SubQuestion,
};
use thiserror::Error;

/// Failure of a single stage adapter call.
///
/// The engine retries any adapter error once in place before treating the
/// stage as fatally failed.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("malformed stage output: {0}")]
    Malformed(String),

    #[error("stage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct PlannerInput {
    pub query: String,
    /// Query refined with reviewer recommendations on iterations after the
    /// first.
    pub refined_query: Option<String>,
    pub iteration: u32,
    pub session_memory: Vec<MemoryEntry>,
}

impl PlannerInput {
    /// The query the planner should decompose this pass.
    pub fn effective_query(&self) -> &str {
        self.refined_query.as_deref().unwrap_or(&self.query)
    }
}

#[derive(Debug, Clone)]
pub struct FinderInput {
    pub sub_questions: Vec<SubQuestion>,
    /// Normalized URLs already accumulated, for early deduplication.
    pub known_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SummarizerInput {
    pub sources: Vec<Source>,
    pub sub_questions: Vec<SubQuestion>,
}

#[derive(Debug, Clone)]
pub struct ReviewerInput {
    pub plan: Plan,
    pub findings: Vec<Finding>,
    pub iteration: u32,
    pub max_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct WriterInput {
    pub query: String,
    pub plan: Plan,
    pub findings: Vec<Finding>,
    pub sources: Vec<Source>,
    /// Final gap report, including gaps left unresolved when the iteration
    /// budget ran out; the report's confidence assessment must reflect them.
    pub gaps: Option<GapReport>,
    pub report_length: ReportLength,
}

#[async_trait]
pub trait PlannerAgent: Send + Sync {
    async fn plan(&self, input: PlannerInput, options: &ResearchOptions)
        -> Result<Plan, AgentError>;
}

#[async_trait]
pub trait FinderAgent: Send + Sync {
    async fn find_sources(
        &self,
        input: FinderInput,
        options: &ResearchOptions,
    ) -> Result<SourceSet, AgentError>;
}

#[async_trait]
pub trait SummarizerAgent: Send + Sync {
    async fn summarize(
        &self,
        input: SummarizerInput,
        options: &ResearchOptions,
    ) -> Result<FindingSet, AgentError>;
}

#[async_trait]
pub trait ReviewerAgent: Send + Sync {
    async fn review(
        &self,
        input: ReviewerInput,
        options: &ResearchOptions,
    ) -> Result<GapReport, AgentError>;
}

#[async_trait]
pub trait WriterAgent: Send + Sync {
    async fn write_report(
        &self,
        input: WriterInput,
        options: &ResearchOptions,
    ) -> Result<Report, AgentError>;
}

/// The five stage adapters a pipeline runs against.
#[derive(Clone)]
pub struct AgentSet {
    pub planner: Arc<dyn PlannerAgent>,
    pub finder: Arc<dyn FinderAgent>,
    pub summarizer: Arc<dyn SummarizerAgent>,
    pub reviewer: Arc<dyn ReviewerAgent>,
    pub writer: Arc<dyn WriterAgent>,
}

impl AgentSet {
    /// Deterministic offline adapters; see [`OfflineAgents`].
    pub fn offline() -> Self {
        OfflineAgents::agent_set()
    }
}
