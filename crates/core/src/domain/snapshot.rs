use serde::{Deserialize, Serialize};

use crate::domain::{
    normalize_url, Finding, GapReport, MemoryEntry, Plan, Report, Source, SubQuestion,
};

/// Accumulated execution state for one running pipeline.
///
/// Owned exclusively by the engine driving the session and persisted as the
/// session's snapshot after every committed stage. Sources and findings
/// accumulate across iterations; the plan appends new sub-questions rather
/// than overwriting earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchSnapshot {
    pub query: String,
    pub plan: Plan,
    pub sources: Vec<Source>,
    pub findings: Vec<Finding>,
    pub gaps: Option<GapReport>,
    pub iteration: u32,
    pub summarizer_retries: u32,
    pub final_report: Option<Report>,
    #[serde(default)]
    pub session_memory: Vec<MemoryEntry>,
    /// Key facts extracted by the most recent summarizer pass.
    #[serde(default)]
    pub last_pass_key_facts: usize,
    /// Sources already handed to the summarizer in earlier passes.
    #[serde(default)]
    pub summarized_until: usize,
}

impl ResearchSnapshot {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            iteration: 1,
            ..Self::default()
        }
    }

    /// Append new sub-questions, skipping ids already planned.
    pub fn extend_plan(&mut self, sub_questions: Vec<SubQuestion>) {
        for sq in sub_questions {
            if !self.plan.sub_questions.iter().any(|p| p.id == sq.id) {
                self.plan.sub_questions.push(sq);
            }
        }
    }

    /// Merge a batch of discovered sources.
    ///
    /// Deduplicates on the normalized URL, keeping the higher-confidence
    /// entry, and caps the accumulated set at `max_sources`. Returns the
    /// sources that were newly added (used for per-source streaming events).
    pub fn merge_sources(&mut self, incoming: Vec<Source>, max_sources: usize) -> Vec<Source> {
        let mut added = Vec::new();
        for source in incoming {
            let key = normalize_url(&source.url);
            if let Some(existing) = self
                .sources
                .iter_mut()
                .find(|s| normalize_url(&s.url) == key)
            {
                if source.confidence > existing.confidence {
                    *existing = source;
                }
                continue;
            }
            if self.sources.len() >= max_sources {
                continue;
            }
            self.sources.push(source.clone());
            added.push(source);
        }
        added
    }

    /// Append findings from a summarizer pass and record its fact yield.
    pub fn extend_findings(&mut self, findings: Vec<Finding>) {
        self.last_pass_key_facts = findings.iter().map(|f| f.key_facts.len()).sum();
        self.findings.extend(findings);
    }

    /// Sources not yet summarized, bounded by the per-pass limit.
    pub fn pending_sources(&self, limit: usize) -> Vec<Source> {
        self.sources
            .iter()
            .skip(self.summarized_until)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Mark `count` further sources as consumed by the summarizer.
    pub fn mark_summarized(&mut self, count: usize) {
        self.summarized_until = (self.summarized_until + count).min(self.sources.len());
    }

    pub fn set_gaps(&mut self, gaps: GapReport) {
        self.gaps = Some(gaps);
    }

    /// Distinct domains among accumulated sources.
    pub fn domain_count(&self) -> usize {
        let mut domains: Vec<&str> = self
            .sources
            .iter()
            .map(|s| s.domain.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        domains.sort_unstable();
        domains.dedup();
        domains.len()
    }
}
