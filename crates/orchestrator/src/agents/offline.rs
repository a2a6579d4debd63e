//! Deterministic offline stage adapters.
//!
//! Used by the server binary when no external research backend is wired and
//! by integration tests that need a pipeline that runs end to end without
//! network access. Every output is a pure function of its input.

use std::sync::Arc;

use async_trait::async_trait;
use research_core::{
    Finding, FindingSet, Gap, GapReport, Plan, Report, ReportLength, ReportSection,
    ResearchOptions, Source, SourceSet, SubQuestion,
};

use super::{
    AgentError, AgentSet, FinderAgent, FinderInput, PlannerAgent, PlannerInput, ReviewerAgent,
    ReviewerInput, SummarizerAgent, SummarizerInput, WriterAgent, WriterInput,
};

pub struct OfflineAgents;

impl OfflineAgents {
    pub fn agent_set() -> AgentSet {
        AgentSet {
            planner: Arc::new(OfflinePlanner),
            finder: Arc::new(OfflineFinder),
            summarizer: Arc::new(OfflineSummarizer),
            reviewer: Arc::new(OfflineReviewer),
            writer: Arc::new(OfflineWriter),
        }
    }
}

struct OfflinePlanner;

#[async_trait]
impl PlannerAgent for OfflinePlanner {
    async fn plan(
        &self,
        input: PlannerInput,
        _options: &ResearchOptions,
    ) -> Result<Plan, AgentError> {
        let query = input.effective_query().to_string();
        let iteration = input.iteration;
        let sub_questions = [
            format!("What is the current state of {query}?"),
            format!("What are the key recent developments around {query}?"),
            format!("What open problems or criticisms surround {query}?"),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, question)| SubQuestion {
            id: format!("sq-{iteration}-{}", index + 1),
            question,
        })
        .collect();

        Ok(Plan { sub_questions })
    }
}

struct OfflineFinder;

#[async_trait]
impl FinderAgent for OfflineFinder {
    async fn find_sources(
        &self,
        input: FinderInput,
        options: &ResearchOptions,
    ) -> Result<SourceSet, AgentError> {
        let mut sources = Vec::new();
        for sq in &input.sub_questions {
            let url = format!("https://research.invalid/{}", sq.id);
            if input.known_urls.iter().any(|known| known == &url) {
                continue;
            }
            sources.push(Source {
                id: format!("src-{}", sq.id),
                url,
                title: format!("Local notes: {}", sq.question),
                domain: "research.invalid".to_string(),
                reliability: "unknown".to_string(),
                confidence: 0.5,
            });
            if sources.len() >= options.max_sources_per_question as usize * input.sub_questions.len()
            {
                break;
            }
        }
        Ok(SourceSet { sources })
    }
}

struct OfflineSummarizer;

#[async_trait]
impl SummarizerAgent for OfflineSummarizer {
    async fn summarize(
        &self,
        input: SummarizerInput,
        _options: &ResearchOptions,
    ) -> Result<FindingSet, AgentError> {
        let findings = input
            .sources
            .iter()
            .map(|source| Finding {
                sub_question_id: source
                    .id
                    .strip_prefix("src-")
                    .unwrap_or(&source.id)
                    .to_string(),
                key_facts: vec![format!(
                    "No retrieval backend configured; recorded placeholder evidence from \"{}\".",
                    source.title
                )],
                relevance_score: 0.5,
            })
            .collect();
        Ok(FindingSet { findings })
    }
}

struct OfflineReviewer;

#[async_trait]
impl ReviewerAgent for OfflineReviewer {
    async fn review(
        &self,
        input: ReviewerInput,
        _options: &ResearchOptions,
    ) -> Result<GapReport, AgentError> {
        // Offline evidence is placeholder-only, so coverage is always judged
        // insufficient but never worth iterating on.
        let gaps = if input.findings.is_empty() {
            vec![Gap {
                category: "coverage".to_string(),
                description: "No findings were extracted for any sub-question.".to_string(),
            }]
        } else {
            vec![Gap {
                category: "depth".to_string(),
                description: "Findings are offline placeholders without real source content."
                    .to_string(),
            }]
        };

        Ok(GapReport {
            gaps,
            recommendations: vec![],
            should_continue: false,
            confidence: 0.25,
        })
    }
}

struct OfflineWriter;

#[async_trait]
impl WriterAgent for OfflineWriter {
    async fn write_report(
        &self,
        input: WriterInput,
        _options: &ResearchOptions,
    ) -> Result<Report, AgentError> {
        let executive_summary = format!(
            "Offline research brief for \"{}\": {} sub-questions planned, {} sources recorded, {} findings extracted.",
            input.query,
            input.plan.sub_questions.len(),
            input.sources.len(),
            input.findings.len(),
        );

        let sections: Vec<ReportSection> = input
            .plan
            .sub_questions
            .iter()
            .map(|sq| {
                let facts: Vec<String> = input
                    .findings
                    .iter()
                    .filter(|f| f.sub_question_id == sq.id)
                    .flat_map(|f| f.key_facts.iter().cloned())
                    .collect();
                let content = if facts.is_empty() {
                    "No findings were recorded for this sub-question.".to_string()
                } else {
                    facts.join(" ")
                };
                ReportSection {
                    heading: sq.question.clone(),
                    content,
                }
            })
            .collect();

        let confidence_assessment = match &input.gaps {
            Some(gaps) if !gaps.gaps.is_empty() => {
                let listing: Vec<String> = gaps
                    .gaps
                    .iter()
                    .map(|g| format!("{}: {}", g.category, g.description))
                    .collect();
                format!(
                    "Confidence {:.2}. {} known gap(s) remain unresolved — {}",
                    gaps.confidence,
                    gaps.gaps.len(),
                    listing.join("; ")
                )
            }
            Some(gaps) => format!(
                "Confidence {:.2}. No outstanding gaps identified.",
                gaps.confidence
            ),
            None => "Confidence not assessed.".to_string(),
        };

        let word_count = sections
            .iter()
            .map(|s| s.content.split_whitespace().count() + s.heading.split_whitespace().count())
            .sum::<usize>()
            + executive_summary.split_whitespace().count();

        let length_label = match input.report_length {
            ReportLength::Short => "short",
            ReportLength::Medium => "medium",
            ReportLength::Long => "long",
        };

        Ok(Report {
            title: format!("Research Brief ({length_label}): {}", input.query),
            executive_summary,
            sections,
            sources_used: input.sources,
            confidence_assessment,
            word_count: word_count as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ResearchOptions {
        ResearchOptions::default()
    }

    #[tokio::test]
    async fn test_planner_is_deterministic() {
        let input = PlannerInput {
            query: "rust async runtimes".to_string(),
            refined_query: None,
            iteration: 1,
            session_memory: vec![],
        };
        let a = OfflinePlanner.plan(input.clone(), &options()).await.unwrap();
        let b = OfflinePlanner.plan(input, &options()).await.unwrap();
        assert_eq!(a.sub_questions, b.sub_questions);
        assert_eq!(a.sub_questions[0].id, "sq-1-1");
    }

    #[tokio::test]
    async fn test_finder_skips_known_urls() {
        let plan = OfflinePlanner
            .plan(
                PlannerInput {
                    query: "q".to_string(),
                    refined_query: None,
                    iteration: 1,
                    session_memory: vec![],
                },
                &options(),
            )
            .await
            .unwrap();

        let first = OfflineFinder
            .find_sources(
                FinderInput {
                    sub_questions: plan.sub_questions.clone(),
                    known_urls: vec![],
                },
                &options(),
            )
            .await
            .unwrap();
        assert_eq!(first.sources.len(), 3);

        let second = OfflineFinder
            .find_sources(
                FinderInput {
                    sub_questions: plan.sub_questions,
                    known_urls: first.sources.iter().map(|s| s.url.clone()).collect(),
                },
                &options(),
            )
            .await
            .unwrap();
        assert!(second.sources.is_empty());
    }

    #[tokio::test]
    async fn test_writer_reflects_unresolved_gaps() {
        let report = OfflineWriter
            .write_report(
                WriterInput {
                    query: "q".to_string(),
                    plan: Plan::default(),
                    findings: vec![],
                    sources: vec![],
                    gaps: Some(GapReport {
                        gaps: vec![Gap {
                            category: "coverage".to_string(),
                            description: "missing recent data".to_string(),
                        }],
                        recommendations: vec![],
                        should_continue: true,
                        confidence: 0.4,
                    }),
                    report_length: ReportLength::Medium,
                },
                &options(),
            )
            .await
            .unwrap();

        assert!(report.confidence_assessment.contains("unresolved"));
        assert!(report.confidence_assessment.contains("missing recent data"));
    }
}
