//! Input analysis: the first stage.
//!
//! Expects a JSON object describing the source and recommending storage.
//! A response without JSON is kept as free-text reasoning.

use etl_core::{PipelineState, Stage, StateValue};
use serde_json::Value;
use tracing::debug;

use crate::core::{PhaseOutcome, StagePhase};
use crate::parsing::extract_json_object;

pub struct InputAnalysisPhase;

impl StagePhase for InputAnalysisPhase {
    fn stage(&self) -> Stage {
        Stage::InputAnalysis
    }

    fn apply_response(&self, state: &mut PipelineState, response: &str) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::ok();

        let Some(object) = extract_json_object(response) else {
            state.storage_reasoning = Some(response.trim().to_string());
            outcome.warn("input analysis response contained no JSON object; kept as storage reasoning");
            return outcome;
        };

        let mut found = 0;

        if let Some(metadata) = object.get("source_metadata").or_else(|| object.get("metadata")) {
            state.source_metadata = Some(metadata.clone());
            found += 1;
        }
        if let Some(sample) = object.get("data_sample") {
            state.data_sample = Some(StateValue::Plain(sample.clone()));
            found += 1;
        }
        if let Some(profile) = object.get("data_profile") {
            state.data_profile = Some(profile.clone());
            found += 1;
        }
        if let Some(recommendation) = object.get("storage_recommendation") {
            state.storage_recommendation = Some(as_text(recommendation));
            found += 1;
        }
        if let Some(reasoning) = object.get("storage_reasoning") {
            state.storage_reasoning = Some(as_text(reasoning));
            found += 1;
        }
        if let Some(alternatives) = object.get("storage_alternatives") {
            state.storage_alternatives = Some(match alternatives {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            });
            found += 1;
        }

        debug!(fields = found, "Input analysis fields extracted");
        if found == 0 {
            outcome.warn("input analysis JSON had none of the expected keys");
        }
        outcome
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
