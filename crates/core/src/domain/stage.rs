use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// One of the four fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InputAnalysis,
    DdlGeneration,
    PipelineGeneration,
    ReportGeneration,
}

/// Static description of a stage: its name, the key of its prompt section
/// and the state fields it is responsible for populating.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub stage: Stage,
    pub prompt_key: &'static str,
    pub output_fields: &'static [&'static str],
}

/// The fixed stage order. A stage's position in this table is its index.
pub const STAGE_TABLE: [StageDescriptor; 4] = [
    StageDescriptor {
        stage: Stage::InputAnalysis,
        prompt_key: "input_analysis",
        output_fields: &[
            "source_metadata",
            "data_sample",
            "data_profile",
            "storage_recommendation",
            "storage_reasoning",
            "storage_alternatives",
        ],
    },
    StageDescriptor {
        stage: Stage::DdlGeneration,
        prompt_key: "ddl_generation",
        output_fields: &["ddl_scripts", "ddl_recommendations"],
    },
    StageDescriptor {
        stage: Stage::PipelineGeneration,
        prompt_key: "pipeline_generation",
        output_fields: &["pipeline_code", "pipeline_config", "transformations"],
    },
    StageDescriptor {
        stage: Stage::ReportGeneration,
        prompt_key: "report_generation",
        output_fields: &["report", "report_sections"],
    },
];

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::InputAnalysis,
        Stage::DdlGeneration,
        Stage::PipelineGeneration,
        Stage::ReportGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputAnalysis => "input_analysis",
            Self::DdlGeneration => "ddl_generation",
            Self::PipelineGeneration => "pipeline_generation",
            Self::ReportGeneration => "report_generation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input_analysis" => Some(Self::InputAnalysis),
            "ddl_generation" => Some(Self::DdlGeneration),
            "pipeline_generation" => Some(Self::PipelineGeneration),
            "report_generation" => Some(Self::ReportGeneration),
            _ => None,
        }
    }

    /// Position of this stage in [`STAGE_TABLE`].
    pub fn index(&self) -> usize {
        match self {
            Self::InputAnalysis => 0,
            Self::DdlGeneration => 1,
            Self::PipelineGeneration => 2,
            Self::ReportGeneration => 3,
        }
    }

    pub fn descriptor(&self) -> &'static StageDescriptor {
        &STAGE_TABLE[self.index()]
    }

    pub fn first() -> Self {
        STAGE_TABLE[0].stage
    }

    pub fn last() -> Self {
        STAGE_TABLE[STAGE_TABLE.len() - 1].stage
    }

    /// The stage that follows this one, `None` for the last stage.
    pub fn next(&self) -> Option<Self> {
        STAGE_TABLE.get(self.index() + 1).map(|d| d.stage)
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownStage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_index() {
        for (i, descriptor) in STAGE_TABLE.iter().enumerate() {
            assert_eq!(descriptor.stage.index(), i);
            assert_eq!(descriptor.prompt_key, descriptor.stage.as_str());
        }
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(Stage::InputAnalysis.next(), Some(Stage::DdlGeneration));
        assert_eq!(Stage::DdlGeneration.next(), Some(Stage::PipelineGeneration));
        assert_eq!(Stage::PipelineGeneration.next(), Some(Stage::ReportGeneration));
        assert_eq!(Stage::ReportGeneration.next(), None);
        assert!(Stage::last().is_last());
        assert_eq!(Stage::first(), Stage::InputAnalysis);
    }

    #[test]
    fn test_parse_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!(Stage::parse("deploy").is_none());
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Stage::PipelineGeneration).unwrap();
        assert_eq!(json, "\"pipeline_generation\"");
    }
}
