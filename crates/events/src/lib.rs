//! Event system for the research pipeline.
//!
//! This crate provides the typed trace-event vocabulary and the per-session
//! ordered event sink used for both live streaming and durable history.

mod sink;
mod types;

pub use sink::SessionSink;
pub use types::*;
