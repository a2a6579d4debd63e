use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// Target report size for writer synthesis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ReportLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

/// Runtime controls for one research session.
///
/// Accepted from clients in either snake_case or camelCase spelling and
/// validated against inclusive bounds before a session is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(default)]
pub struct ResearchOptions {
    /// Maximum reviewer-planner loop iterations.
    #[serde(alias = "maxIterations")]
    pub max_iterations: u32,
    /// Maximum total discovered sources.
    #[serde(alias = "maxSources")]
    pub max_sources: u32,
    /// Maximum retained sources per sub-question.
    #[serde(alias = "maxSourcesPerQuestion")]
    pub max_sources_per_question: u32,
    /// Raw search hits requested for each generated search query.
    #[serde(alias = "searchResultsPerQuery")]
    pub search_results_per_query: u32,
    /// Maximum sources handed to the summarizer per pass.
    #[serde(alias = "summarizerSourceLimit")]
    pub summarizer_source_limit: u32,
    /// How many prior completed sessions to include as planner context.
    #[serde(alias = "sessionMemoryLimit")]
    pub session_memory_limit: u32,
    /// When enabled, limit duplicated domains in source selection.
    #[serde(alias = "sourceDiversity")]
    pub source_diversity: bool,
    /// Use recent completed sessions as memory context for planning.
    #[serde(alias = "includeSessionMemory")]
    pub include_session_memory: bool,
    #[serde(alias = "reportLength")]
    pub report_length: ReportLength,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_sources: 12,
            max_sources_per_question: 4,
            search_results_per_query: 5,
            summarizer_source_limit: 6,
            session_memory_limit: 3,
            source_diversity: true,
            include_session_memory: true,
            report_length: ReportLength::default(),
        }
    }
}

impl ResearchOptions {
    /// Inclusive bounds for every numeric option, in documented order.
    const BOUNDS: [(&'static str, u32, u32); 6] = [
        ("max_iterations", 1, 10),
        ("max_sources", 3, 40),
        ("max_sources_per_question", 1, 12),
        ("search_results_per_query", 1, 15),
        ("summarizer_source_limit", 1, 20),
        ("session_memory_limit", 0, 8),
    ];

    /// Validate all numeric fields, returning the first violated bound.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, min, max) in Self::BOUNDS {
            let value = match field {
                "max_iterations" => self.max_iterations,
                "max_sources" => self.max_sources,
                "max_sources_per_question" => self.max_sources_per_question,
                "search_results_per_query" => self.search_results_per_query,
                "summarizer_source_limit" => self.summarizer_source_limit,
                "session_memory_limit" => self.session_memory_limit,
                _ => unreachable!(),
            };
            if value < min || value > max {
                return Err(CoreError::OptionOutOfRange {
                    field,
                    min: min as i64,
                    max: max as i64,
                    value: value as i64,
                });
            }
        }
        Ok(())
    }
}
