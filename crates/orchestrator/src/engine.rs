//! Pipeline engine: executes one session's stage graph.
//!
//! One engine instance owns one session's mutable execution state and is the
//! only writer to that session's row while active. Every stage invocation
//! runs under a hard timeout with a single in-place retry, the cancellation
//! token is observed at every suspension point, and each committed stage is
//! followed by an event append plus a snapshot write before routing.

use std::sync::Arc;
use std::time::Duration;

use db::{DocumentRepository, SessionRepository};
use events::EventKind;
use research_core::{
    FindingSet, GapReport, Plan, Report, ResearchOptions, ResearchSnapshot, SessionStatus,
    SourceSet, Stage,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{
    AgentError, AgentSet, FinderInput, PlannerInput, ReviewerInput, SummarizerInput, WriterInput,
};
use crate::event_log::SessionEventLog;
use crate::state_machine::{advance, reviewer_decision, Next};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard timeout for a single stage adapter call.
    pub stage_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(120),
        }
    }
}

enum StageOutcome {
    Committed,
    Cancelled,
    Failed(String),
}

enum StageOutput {
    Plan(Plan),
    Sources(SourceSet),
    Findings(FindingSet),
    Gaps(GapReport),
    Report(Report),
}

pub struct PipelineEngine {
    session_id: Uuid,
    options: ResearchOptions,
    agents: AgentSet,
    log: Arc<SessionEventLog>,
    sessions: SessionRepository,
    documents: DocumentRepository,
    cancel: CancellationToken,
    config: EngineConfig,
}

impl PipelineEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: Uuid,
        options: ResearchOptions,
        agents: AgentSet,
        log: Arc<SessionEventLog>,
        sessions: SessionRepository,
        documents: DocumentRepository,
        cancel: CancellationToken,
        config: EngineConfig,
    ) -> Self {
        Self {
            session_id,
            options,
            agents,
            log,
            sessions,
            documents,
            cancel,
            config,
        }
    }

    /// Drive the stage graph to a terminal state and return it.
    pub async fn run(
        self,
        query: String,
        session_memory: Vec<research_core::MemoryEntry>,
    ) -> SessionStatus {
        let mut snapshot = ResearchSnapshot::new(query.clone());
        snapshot.session_memory = session_memory;

        self.emit(EventKind::ResearchStarted {
            query,
            options: self.options.clone(),
        })
        .await;

        let mut stage = Stage::Planner;
        loop {
            if self.cancel.is_cancelled() {
                return self.finalize_stopped(stage, &snapshot).await;
            }

            match self.run_stage(stage, &mut snapshot).await {
                StageOutcome::Committed => {}
                StageOutcome::Cancelled => return self.finalize_stopped(stage, &snapshot).await,
                StageOutcome::Failed(reason) => {
                    return self.finalize_error(stage, &snapshot, reason).await
                }
            }

            if let Err(e) = self
                .sessions
                .save_snapshot(self.session_id, stage, &snapshot)
                .await
            {
                error!(session_id = %self.session_id, error = %e, "Failed to persist snapshot");
            }

            match advance(stage, &mut snapshot, &self.options) {
                Next::Stage(next) => stage = next,
                Next::Done => return self.finalize_completed(&snapshot).await,
            }
        }
    }

    async fn run_stage(&self, stage: Stage, snapshot: &mut ResearchSnapshot) -> StageOutcome {
        self.emit(self.running_event(stage, snapshot)).await;

        let mut attempt = 0u8;
        loop {
            attempt += 1;
            let call = tokio::time::timeout(self.config.stage_timeout, self.invoke(stage, snapshot));
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StageOutcome::Cancelled,
                result = call => result,
            };

            let failure = match result {
                Ok(Ok(output)) => {
                    if self.cancel.is_cancelled() {
                        // Stop was requested while the call ran; the result
                        // must not be applied.
                        return StageOutcome::Cancelled;
                    }
                    self.commit(output, snapshot).await;
                    return StageOutcome::Committed;
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!(
                    "{} stage timed out after {:?}",
                    stage.as_str(),
                    self.config.stage_timeout
                ),
            };

            if attempt == 1 {
                warn!(
                    session_id = %self.session_id,
                    stage = stage.as_str(),
                    error = %failure,
                    "Stage failed, retrying once"
                );
                continue;
            }
            return StageOutcome::Failed(failure);
        }
    }

    async fn invoke(
        &self,
        stage: Stage,
        snapshot: &ResearchSnapshot,
    ) -> Result<StageOutput, AgentError> {
        match stage {
            Stage::Planner => {
                let input = self.planner_input(snapshot);
                self.agents
                    .planner
                    .plan(input, &self.options)
                    .await
                    .map(StageOutput::Plan)
            }
            Stage::Finder => {
                let input = FinderInput {
                    sub_questions: snapshot.plan.sub_questions.clone(),
                    known_urls: snapshot
                        .sources
                        .iter()
                        .map(|s| research_core::normalize_url(&s.url))
                        .collect(),
                };
                self.agents
                    .finder
                    .find_sources(input, &self.options)
                    .await
                    .map(StageOutput::Sources)
            }
            Stage::Summarizer => {
                let input = SummarizerInput {
                    sources: snapshot
                        .pending_sources(self.options.summarizer_source_limit as usize),
                    sub_questions: snapshot.plan.sub_questions.clone(),
                };
                self.agents
                    .summarizer
                    .summarize(input, &self.options)
                    .await
                    .map(StageOutput::Findings)
            }
            Stage::Reviewer => {
                let input = ReviewerInput {
                    plan: snapshot.plan.clone(),
                    findings: snapshot.findings.clone(),
                    iteration: snapshot.iteration,
                    max_iterations: self.options.max_iterations,
                };
                self.agents
                    .reviewer
                    .review(input, &self.options)
                    .await
                    .map(StageOutput::Gaps)
            }
            Stage::Writer => {
                let input = WriterInput {
                    query: snapshot.query.clone(),
                    plan: snapshot.plan.clone(),
                    findings: snapshot.findings.clone(),
                    sources: snapshot.sources.clone(),
                    gaps: snapshot.gaps.clone(),
                    report_length: self.options.report_length,
                };
                self.agents
                    .writer
                    .write_report(input, &self.options)
                    .await
                    .map(StageOutput::Report)
            }
        }
    }

    fn planner_input(&self, snapshot: &ResearchSnapshot) -> PlannerInput {
        let refined_query = if snapshot.iteration > 1 {
            snapshot.gaps.as_ref().and_then(|gaps| {
                let recommendations: Vec<&str> = gaps
                    .recommendations
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                if recommendations.is_empty() {
                    None
                } else {
                    Some(format!(
                        "{} (Additional focus: {})",
                        snapshot.query,
                        recommendations.join(" ")
                    ))
                }
            })
        } else {
            None
        };

        PlannerInput {
            query: snapshot.query.clone(),
            refined_query,
            iteration: snapshot.iteration,
            session_memory: snapshot.session_memory.clone(),
        }
    }

    fn running_event(&self, stage: Stage, snapshot: &ResearchSnapshot) -> EventKind {
        match stage {
            Stage::Planner => EventKind::PlannerRunning {
                message: if snapshot.iteration > 1 {
                    format!(
                        "Iteration {}: refining research based on gaps...",
                        snapshot.iteration
                    )
                } else {
                    "Analyzing query and generating research plan...".to_string()
                },
            },
            Stage::Finder => EventKind::FinderRunning {
                message: "Searching for diverse sources across domains...".to_string(),
            },
            Stage::Summarizer => EventKind::SummarizerRunning {
                message: "Fetching and analyzing source content...".to_string(),
            },
            Stage::Reviewer => EventKind::ReviewerRunning {
                message: "Analyzing findings for coverage gaps and depth issues...".to_string(),
            },
            Stage::Writer => EventKind::WriterRunning {
                message: format!(
                    "Synthesizing {} findings into a cited report...",
                    snapshot.findings.len()
                ),
            },
        }
    }

    async fn commit(&self, output: StageOutput, snapshot: &mut ResearchSnapshot) {
        match output {
            StageOutput::Plan(plan) => {
                let questions: Vec<String> =
                    plan.sub_questions.iter().map(|sq| sq.question.clone()).collect();
                snapshot.extend_plan(plan.sub_questions);
                self.emit(EventKind::PlannerComplete {
                    sub_questions_count: questions.len(),
                    questions,
                })
                .await;
            }
            StageOutput::Sources(set) => {
                let added =
                    snapshot.merge_sources(set.sources, self.options.max_sources as usize);
                let base = snapshot.sources.len() - added.len();
                for (index, source) in added.into_iter().enumerate() {
                    self.emit(EventKind::FinderSource {
                        source,
                        sources_so_far: base + index + 1,
                    })
                    .await;
                }
                self.emit(EventKind::FinderComplete {
                    sources_count: snapshot.sources.len(),
                    domains_count: snapshot.domain_count(),
                })
                .await;
            }
            StageOutput::Findings(set) => {
                let consumed = snapshot
                    .pending_sources(self.options.summarizer_source_limit as usize)
                    .len();
                snapshot.mark_summarized(consumed);

                let findings_count = set.findings.len();
                let key_facts_count = set.key_fact_count();
                snapshot.extend_findings(set.findings);
                self.emit(EventKind::SummarizerComplete {
                    findings_count,
                    key_facts_count,
                })
                .await;
            }
            StageOutput::Gaps(report) => {
                let next_action =
                    reviewer_decision(&report, snapshot.iteration, self.options.max_iterations);
                self.emit(EventKind::ReviewerComplete {
                    gaps_found: report.gaps.len(),
                    confidence: report.confidence,
                    next_action,
                })
                .await;
                snapshot.set_gaps(report);
            }
            StageOutput::Report(report) => {
                self.emit(EventKind::WriterComplete {
                    word_count: report.word_count,
                    sources_cited: report.sources_used.len(),
                })
                .await;
                snapshot.final_report = Some(report);
            }
        }
    }

    async fn finalize_completed(&self, snapshot: &ResearchSnapshot) -> SessionStatus {
        if self.cancel.is_cancelled() {
            return self.finalize_stopped(Stage::Writer, snapshot).await;
        }

        let Some(report) = snapshot.final_report.clone() else {
            return self
                .finalize_error(
                    Stage::Writer,
                    snapshot,
                    "pipeline finished without a final report".to_string(),
                )
                .await;
        };

        match self
            .documents
            .save_final_report(self.session_id, &report, &report.to_markdown())
            .await
        {
            Ok(true) => {
                self.emit(EventKind::ResearchCompleted {
                    title: report.title.clone(),
                    word_count: report.word_count,
                    iterations: snapshot.iteration,
                    report,
                })
                .await;
                info!(
                    session_id = %self.session_id,
                    iterations = snapshot.iteration,
                    "Research completed"
                );
                SessionStatus::Completed
            }
            Ok(false) => {
                // The session reached a terminal state out from under us;
                // the report is discarded.
                warn!(session_id = %self.session_id, "Session already terminal, discarding report");
                self.emit(EventKind::ResearchStopped).await;
                SessionStatus::Stopped
            }
            Err(e) => {
                self.finalize_error(Stage::Writer, snapshot, e.to_string())
                    .await
            }
        }
    }

    async fn finalize_stopped(&self, stage: Stage, snapshot: &ResearchSnapshot) -> SessionStatus {
        if let Err(e) = self
            .sessions
            .save_snapshot(self.session_id, stage, snapshot)
            .await
        {
            error!(session_id = %self.session_id, error = %e, "Failed to persist snapshot");
        }
        if let Err(e) = self
            .sessions
            .update_status(self.session_id, SessionStatus::Stopped, None)
            .await
        {
            error!(session_id = %self.session_id, error = %e, "Failed to mark session stopped");
        }
        self.emit(EventKind::ResearchStopped).await;
        info!(session_id = %self.session_id, "Research stopped");
        SessionStatus::Stopped
    }

    async fn finalize_error(
        &self,
        stage: Stage,
        snapshot: &ResearchSnapshot,
        reason: String,
    ) -> SessionStatus {
        // Partial findings collected so far are preserved in the snapshot.
        if let Err(e) = self
            .sessions
            .save_snapshot(self.session_id, stage, snapshot)
            .await
        {
            error!(session_id = %self.session_id, error = %e, "Failed to persist snapshot");
        }
        if let Err(e) = self
            .sessions
            .update_status(self.session_id, SessionStatus::Error, Some(&reason))
            .await
        {
            error!(session_id = %self.session_id, error = %e, "Failed to mark session errored");
        }
        error!(session_id = %self.session_id, stage = stage.as_str(), error = %reason, "Research failed");
        self.emit(EventKind::ResearchError { error: reason }).await;
        SessionStatus::Error
    }

    async fn emit(&self, kind: EventKind) {
        if let Err(e) = self.log.append(kind).await {
            error!(session_id = %self.session_id, error = %e, "Failed to append event");
        }
    }
}
