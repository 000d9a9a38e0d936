use etl_core::{PipelineState, Stage};

use crate::core::{PhaseOutcome, StagePhase};
use crate::parsing::markdown_sections;

/// Report generation: the response is the report.
pub struct ReportGenerationPhase;

impl StagePhase for ReportGenerationPhase {
    fn stage(&self) -> Stage {
        Stage::ReportGeneration
    }

    fn apply_response(&self, state: &mut PipelineState, response: &str) -> PhaseOutcome {
        let report = response.trim().to_string();
        state.report_sections = Some(markdown_sections(&report));
        state.report = Some(report);
        PhaseOutcome::ok()
    }
}
