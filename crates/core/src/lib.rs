//! Domain model for the deep-research orchestration engine.
//!
//! This crate holds the types shared by every other crate: session records,
//! runtime options, the research artifacts produced by pipeline stages, and
//! the accumulated execution snapshot.

pub mod domain;
mod error;

pub use domain::*;
pub use error::CoreError;
