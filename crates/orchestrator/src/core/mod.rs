//! Core abstractions for stage execution.
//!
//! - [`StagePhase`] - Trait each pipeline stage implements
//! - [`PhaseOutcome`] - What a stage's response handling produced
//! - [`StageExecutor`] - Runs one stage against a state record
//! - [`StageOutcome`] - Summary of one stage run

mod execution;
mod phase;

pub use execution::StageExecutor;
pub use phase::{PhaseOutcome, StageOutcome, StagePhase};
