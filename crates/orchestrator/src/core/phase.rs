//! Stage trait and related types.
//!
//! Each of the four stages implements [`StagePhase`]. The executor owns
//! everything common to a stage run (message building, invocation, retries,
//! bookkeeping). A phase only turns a model response into state fields.

use etl_core::{PipelineState, Stage};

/// Result of applying a model response to the state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// Problems noticed while extracting fields, recorded as warnings
    pub warnings: Vec<String>,
}

impl PhaseOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Summary of one stage run, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub success: bool,
    /// Invocation attempts made, including the successful one
    pub attempts: u32,
    /// Whether the stage was appended to `completed_agents`
    pub recorded: bool,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn failed(stage: Stage, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            stage,
            success: false,
            attempts,
            recorded: false,
            error: Some(error.into()),
        }
    }
}

/// A pipeline stage.
pub trait StagePhase: Send + Sync {
    fn stage(&self) -> Stage;

    /// Whether the stage's model is asked for tool use; part of the model cache key.
    fn use_tools(&self) -> bool {
        false
    }

    /// Extract the stage's output fields from a successful response.
    ///
    /// Must not fail: anything that cannot be extracted is reported as a warning.
    fn apply_response(&self, state: &mut PipelineState, response: &str) -> PhaseOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_outcome_collects_warnings() {
        let mut outcome = PhaseOutcome::ok();
        assert!(outcome.warnings.is_empty());
        outcome.warn("no json");
        assert_eq!(outcome.warnings, vec!["no json".to_string()]);
    }

    #[test]
    fn test_failed_stage_outcome() {
        let outcome = StageOutcome::failed(Stage::DdlGeneration, 3, "timeout");
        assert!(!outcome.success);
        assert!(!outcome.recorded);
        assert_eq!(outcome.error.as_deref(), Some("timeout"));
    }
}
