use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A decomposed sub-question from the research plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SubQuestion {
    pub id: String,
    pub question: String,
}

/// Planner output: the set of sub-questions to research.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Plan {
    pub sub_questions: Vec<SubQuestion>,
}

/// A discovered source with retrieval metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    pub reliability: String,
    pub confidence: f64,
}

/// Finder output for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceSet {
    pub sources: Vec<Source>,
}

/// Compressed evidence extracted from one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Finding {
    pub sub_question_id: String,
    pub key_facts: Vec<String>,
    pub relevance_score: f64,
}

/// Summarizer output for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FindingSet {
    pub findings: Vec<Finding>,
}

impl FindingSet {
    /// Total key facts across all findings in this set.
    pub fn key_fact_count(&self) -> usize {
        self.findings.iter().map(|f| f.key_facts.len()).sum()
    }
}

/// A reviewer-identified deficiency in coverage, depth, diversity,
/// recency, or consistency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Gap {
    pub category: String,
    pub description: String,
}

/// Reviewer output: coverage assessment and the iterate/finish decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GapReport {
    pub gaps: Vec<Gap>,
    /// Suggested focus areas for the next planner pass.
    pub recommendations: Vec<String>,
    pub should_continue: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReportSection {
    pub heading: String,
    pub content: String,
}

/// Writer output: the synthesized, cited final report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<ReportSection>,
    pub sources_used: Vec<Source>,
    pub confidence_assessment: String,
    pub word_count: u32,
}

impl Report {
    /// Render the stored report into markdown for the persisted document.
    ///
    /// Deterministic: the same report value always produces the same text.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = vec![format!("# {}", self.title), String::new()];

        lines.push("## Executive Summary".to_string());
        if self.executive_summary.is_empty() {
            lines.push("No executive summary generated.".to_string());
        } else {
            lines.push(self.executive_summary.clone());
        }
        lines.push(String::new());

        lines.push("## Sections".to_string());
        if self.sections.is_empty() {
            lines.push("No sections generated.".to_string());
            lines.push(String::new());
        } else {
            for section in &self.sections {
                lines.push(format!("### {}", section.heading));
                lines.push(section.content.clone());
                lines.push(String::new());
            }
        }

        lines.push("## Confidence Assessment".to_string());
        if self.confidence_assessment.is_empty() {
            lines.push("No confidence assessment provided.".to_string());
        } else {
            lines.push(self.confidence_assessment.clone());
        }
        lines.push(String::new());

        lines.push("## Sources".to_string());
        if self.sources_used.is_empty() {
            lines.push("No sources captured.".to_string());
        } else {
            for (index, source) in self.sources_used.iter().enumerate() {
                if source.url.is_empty() {
                    lines.push(format!(
                        "{}. {} ({})",
                        index + 1,
                        source.title,
                        source.reliability
                    ));
                } else {
                    lines.push(format!(
                        "{}. [{}]({}) ({})",
                        index + 1,
                        source.title,
                        source.url,
                        source.reliability
                    ));
                }
            }
        }
        lines.push(String::new());
        lines.push(format!("_Word count: {}_", self.word_count));
        lines.join("\n")
    }
}

/// Summary of a prior completed session, injected as planner context.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryEntry {
    pub session_id: uuid::Uuid,
    pub query: String,
    pub title: String,
    pub executive_summary: String,
    pub sources_count: usize,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Canonical form of a source URL used for cross-iteration deduplication.
///
/// Lowercases the scheme and host and strips a single trailing slash, so
/// `https://Example.org/page/` and `https://example.org/page` collide.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.split_once('/') {
                Some((host, path)) => (host, Some(path)),
                None => (rest, None),
            };
            let mut normalized = format!("{}://{}", scheme.to_lowercase(), host.to_lowercase());
            if let Some(path) = path {
                normalized.push('/');
                normalized.push_str(path);
            }
            normalized
        }
        None => trimmed.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source(url: &str) -> Source {
        Source {
            id: "src-1".to_string(),
            url: url.to_string(),
            title: "Example".to_string(),
            domain: "example.org".to_string(),
            reliability: "high".to_string(),
            confidence: 0.8,
        }
    }

    #[test]
    fn test_normalize_url_strips_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.org/page/"),
            normalize_url("https://example.org/page")
        );
    }

    #[test]
    fn test_normalize_url_lowercases_host_only() {
        assert_eq!(
            normalize_url("HTTPS://Example.ORG/Path/To"),
            "https://example.org/Path/To"
        );
    }

    #[test]
    fn test_normalize_url_bare_host() {
        assert_eq!(normalize_url("https://Example.org/"), "https://example.org");
    }

    #[test]
    fn test_key_fact_count() {
        let set = FindingSet {
            findings: vec![
                Finding {
                    sub_question_id: "sq-1".to_string(),
                    key_facts: vec!["a".to_string(), "b".to_string()],
                    relevance_score: 0.9,
                },
                Finding {
                    sub_question_id: "sq-2".to_string(),
                    key_facts: vec![],
                    relevance_score: 0.1,
                },
            ],
        };
        assert_eq!(set.key_fact_count(), 2);
    }

    #[test]
    fn test_report_markdown_renders_all_parts() {
        let report = Report {
            title: "AI Governance".to_string(),
            executive_summary: "Summary text".to_string(),
            sections: vec![ReportSection {
                heading: "Findings".to_string(),
                content: "Details".to_string(),
            }],
            sources_used: vec![sample_source("https://example.org/doc")],
            confidence_assessment: "High confidence".to_string(),
            word_count: 700,
        };

        let md = report.to_markdown();
        assert!(md.starts_with("# AI Governance"));
        assert!(md.contains("## Executive Summary"));
        assert!(md.contains("### Findings"));
        assert!(md.contains("1. [Example](https://example.org/doc) (high)"));
        assert!(md.contains("_Word count: 700_"));
    }

    #[test]
    fn test_report_markdown_is_deterministic() {
        let report = Report {
            title: "T".to_string(),
            ..Report::default()
        };
        assert_eq!(report.to_markdown(), report.to_markdown());
    }

    #[test]
    fn test_report_markdown_empty_fields_use_placeholders() {
        let md = Report::default().to_markdown();
        assert!(md.contains("No executive summary generated."));
        assert!(md.contains("No sections generated."));
        assert!(md.contains("No sources captured."));
    }
}
