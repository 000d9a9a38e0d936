//! Stage implementations of the [`StagePhase`] trait:
//!
//! - [`InputAnalysisPhase`] - Source metadata, profile and storage recommendation
//! - [`DdlGenerationPhase`] - DDL scripts for the recommended storage
//! - [`PipelineGenerationPhase`] - Pipeline code and configuration
//! - [`ReportGenerationPhase`] - Final Markdown report
//!
//! [`StagePhase`]: crate::core::StagePhase

mod ddl_generation;
mod input_analysis;
mod pipeline_generation;
mod report_generation;

pub use ddl_generation::DdlGenerationPhase;
pub use input_analysis::InputAnalysisPhase;
pub use pipeline_generation::PipelineGenerationPhase;
pub use report_generation::ReportGenerationPhase;

use etl_core::Stage;

use crate::core::StagePhase;

/// The phase implementing `stage`.
pub fn phase_for(stage: Stage) -> &'static dyn StagePhase {
    match stage {
        Stage::InputAnalysis => &InputAnalysisPhase,
        Stage::DdlGeneration => &DdlGenerationPhase,
        Stage::PipelineGeneration => &PipelineGenerationPhase,
        Stage::ReportGeneration => &ReportGenerationPhase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_for_matches_stage() {
        for stage in Stage::ALL {
            assert_eq!(phase_for(stage).stage(), stage);
            assert!(!phase_for(stage).use_tools());
        }
    }
}
