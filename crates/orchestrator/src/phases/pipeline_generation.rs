use etl_core::{PipelineState, Stage};
use serde_json::Value;

use crate::core::{PhaseOutcome, StagePhase};
use crate::parsing::{blocks_with_lang, first_json_block};

/// Pipeline generation: a ```python block with the pipeline and a ```json
/// block with its configuration.
pub struct PipelineGenerationPhase;

impl StagePhase for PipelineGenerationPhase {
    fn stage(&self) -> Stage {
        Stage::PipelineGeneration
    }

    fn apply_response(&self, state: &mut PipelineState, response: &str) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::ok();

        let code = blocks_with_lang(response, "python")
            .into_iter()
            .chain(blocks_with_lang(response, "py"))
            .next();
        match code {
            Some(code) => state.pipeline_code = Some(code),
            None => outcome.warn("pipeline generation response contained no Python code"),
        }

        if let Some(config) = first_json_block(response) {
            if let Some(Value::Array(items)) = config.get("transformations") {
                let transformations = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                state.transformations = Some(transformations);
            }
            state.pipeline_config = Some(config);
        }

        outcome
    }
}
