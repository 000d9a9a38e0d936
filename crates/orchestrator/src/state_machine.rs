use etl_core::{PipelineState, Stage};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Position of a run in the linear stage sequence.
///
/// A stage status means that stage is the last one completed. A run whose
/// last stage has completed is `ReportGeneration` until it is finalized,
/// then `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    InputAnalysis,
    DdlGeneration,
    PipelineGeneration,
    ReportGeneration,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not_started",
            RunStatus::InputAnalysis => "input_analysis",
            RunStatus::DdlGeneration => "ddl_generation",
            RunStatus::PipelineGeneration => "pipeline_generation",
            RunStatus::ReportGeneration => "report_generation",
            RunStatus::Completed => "completed",
        }
    }

    fn from_stage(stage: Stage) -> Self {
        match stage {
            Stage::InputAnalysis => RunStatus::InputAnalysis,
            Stage::DdlGeneration => RunStatus::DdlGeneration,
            Stage::PipelineGeneration => RunStatus::PipelineGeneration,
            Stage::ReportGeneration => RunStatus::ReportGeneration,
        }
    }
}

pub struct PipelineStateMachine;

impl PipelineStateMachine {
    pub fn status_of(state: &PipelineState) -> RunStatus {
        match state.completed_agents.last() {
            None => RunStatus::NotStarted,
            Some(stage) if stage.is_last() && state.execution_stats.is_some() => {
                RunStatus::Completed
            }
            Some(stage) => RunStatus::from_stage(*stage),
        }
    }

    /// The stage a run in `status` executes next.
    pub fn next_stage(status: RunStatus) -> Option<Stage> {
        match status {
            RunStatus::NotStarted => Some(Stage::first()),
            RunStatus::InputAnalysis => Stage::InputAnalysis.next(),
            RunStatus::DdlGeneration => Stage::DdlGeneration.next(),
            RunStatus::PipelineGeneration => Stage::PipelineGeneration.next(),
            RunStatus::ReportGeneration | RunStatus::Completed => None,
        }
    }

    pub fn validate_transition(from: RunStatus, to: RunStatus) -> Result<()> {
        if Self::allowed_transition(from) == Some(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidRequest(format!(
                "invalid run transition from {} to {}",
                from.as_str(),
                to.as_str()
            )))
        }
    }

    fn allowed_transition(from: RunStatus) -> Option<RunStatus> {
        match from {
            RunStatus::NotStarted => Some(RunStatus::InputAnalysis),
            RunStatus::InputAnalysis => Some(RunStatus::DdlGeneration),
            RunStatus::DdlGeneration => Some(RunStatus::PipelineGeneration),
            RunStatus::PipelineGeneration => Some(RunStatus::ReportGeneration),
            RunStatus::ReportGeneration => Some(RunStatus::Completed),
            RunStatus::Completed => None,
        }
    }
}
