//! Drives the fixed stage sequence over a state record.

use chrono::Utc;
use etl_core::{PipelineState, Stage};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::{StageExecutor, StageOutcome};
use crate::phases::phase_for;
use crate::services::ExecutorContext;
use crate::state_machine::{PipelineStateMachine, RunStatus};

pub struct PipelineRunner {
    executor: StageExecutor,
}

impl PipelineRunner {
    pub fn new(ctx: Arc<ExecutorContext>) -> Self {
        Self {
            executor: StageExecutor::new(ctx),
        }
    }

    pub async fn run_stage(&self, stage: Stage, state: &mut PipelineState) -> StageOutcome {
        self.executor.execute(phase_for(stage), state).await
    }

    /// Run every stage in order, whatever earlier stages did.
    pub async fn run_to_completion(&self, mut state: PipelineState) -> PipelineState {
        if state.start_time.is_none() {
            state.start_time = Some(Utc::now());
        }
        info!(execution_id = ?state.execution_id, "Starting pipeline run");

        for stage in Stage::ALL {
            let outcome = self.run_stage(stage, &mut state).await;
            debug!(stage = %stage, success = outcome.success, "Stage finished");
        }

        state.finalize();
        info!(
            execution_id = ?state.execution_id,
            completed = state.completed_agents.len(),
            errors = state.errors.len(),
            "Pipeline run finished"
        );
        state
    }

    /// Run the stage after the last completed one, or the first stage when
    /// none has completed yet. A finished run is returned unchanged.
    pub async fn run_next_stage(&self, mut state: PipelineState) -> PipelineState {
        let before = PipelineStateMachine::status_of(&state);
        let Some(stage) = PipelineStateMachine::next_stage(before) else {
            debug!(status = before.as_str(), "Pipeline already complete, nothing to run");
            return state;
        };

        let outcome = self.run_stage(stage, &mut state).await;
        if !outcome.recorded {
            return state;
        }

        let mut after = PipelineStateMachine::status_of(&state);
        check_transition(before, after);

        if state.is_finished() {
            state.finalize();
            let finalized = PipelineStateMachine::status_of(&state);
            check_transition(after, finalized);
            after = finalized;
        }

        debug!(from = before.as_str(), to = after.as_str(), "Run advanced");
        state
    }
}

fn check_transition(from: RunStatus, to: RunStatus) {
    if let Err(e) = PipelineStateMachine::validate_transition(from, to) {
        warn!(error = %e, "Run left the stage sequence");
    }
}
