//! Explicit stage transition table.
//!
//! The conditional routing of the research pipeline is an enumerated pure
//! function rather than a general graph runtime, with both loop counters
//! checked *before* the corresponding loop-back edge. That makes
//! termination provable by inspection: the Reviewer→Planner loop runs at
//! most `max_iterations` times and the Summarizer→Finder loop at most
//! `SUMMARIZER_RETRY_MAX` times, on independent counters.

use events::NextAction;
use research_core::{GapReport, ResearchOptions, ResearchSnapshot, Stage};

/// Maximum Summarizer→Finder retries triggered by zero-fact passes.
pub const SUMMARIZER_RETRY_MAX: u32 = 2;

/// Where the pipeline goes after a committed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(Stage),
    Done,
}

/// Routing decision after the reviewer, also carried on the
/// `reviewer_complete` event.
pub fn reviewer_decision(gaps: &GapReport, iteration: u32, max_iterations: u32) -> NextAction {
    if gaps.should_continue && iteration < max_iterations {
        NextAction::Iterate
    } else {
        NextAction::Finish
    }
}

/// Advance the stage graph after `stage` committed its result.
///
/// Loop-back edges increment their counter here, so a counter is always
/// bumped before the stage it re-enters runs.
pub fn advance(stage: Stage, snapshot: &mut ResearchSnapshot, options: &ResearchOptions) -> Next {
    match stage {
        Stage::Planner => Next::Stage(Stage::Finder),
        Stage::Finder => Next::Stage(Stage::Summarizer),
        Stage::Summarizer => {
            if snapshot.last_pass_key_facts == 0
                && snapshot.summarizer_retries < SUMMARIZER_RETRY_MAX
            {
                snapshot.summarizer_retries += 1;
                Next::Stage(Stage::Finder)
            } else {
                Next::Stage(Stage::Reviewer)
            }
        }
        Stage::Reviewer => {
            let gaps = snapshot.gaps.clone().unwrap_or_default();
            match reviewer_decision(&gaps, snapshot.iteration, options.max_iterations) {
                NextAction::Iterate => {
                    snapshot.iteration += 1;
                    Next::Stage(Stage::Planner)
                }
                NextAction::Finish => Next::Stage(Stage::Writer),
            }
        }
        Stage::Writer => Next::Done,
    }
}
