//! Caller-facing projections of a state record.

use etl_core::{DdlScript, ExecutionStats, PipelineState, Stage, StageError, StageWarning};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    CompletedWithErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveStatus {
    Processing,
    WaitingForFeedback,
    Completed,
}

/// Input analysis results as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    #[schema(value_type = Object)]
    pub metadata: Value,
    #[schema(value_type = Object)]
    pub data_profile: Value,
    pub storage_recommendation: Option<String>,
    pub storage_reasoning: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub storage_alternatives: Vec<Value>,
}

impl AnalysisResult {
    fn from_state(state: &PipelineState) -> Self {
        Self {
            metadata: state.source_metadata.clone().unwrap_or_else(empty_object),
            data_profile: state.data_profile.clone().unwrap_or_else(empty_object),
            storage_recommendation: state.storage_recommendation.clone(),
            storage_reasoning: state.storage_reasoning.clone(),
            storage_alternatives: state.storage_alternatives.clone().unwrap_or_default(),
        }
    }
}

/// Result of a run-to-completion analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub status: BatchStatus,
    pub execution_id: Option<Uuid>,
    pub analysis_result: AnalysisResult,
    pub ddl_scripts: Vec<DdlScript>,
    #[schema(value_type = Object)]
    pub pipeline_config: Value,
    pub pipeline_code: String,
    pub report: String,
    pub execution_stats: ExecutionStats,
    pub errors: Vec<StageError>,
    pub warnings: Vec<StageWarning>,
}

/// Result of one interactive step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InteractiveResponse {
    pub status: InteractiveStatus,
    pub session_id: Option<String>,
    /// Last completed stage, or "unknown" before the first one
    pub current_stage: String,
    pub completed_stages: Vec<Stage>,
    /// Output of the current stage; holds `full_results` once the run is complete
    #[schema(value_type = Object)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<StageError>>,
}

/// Body returned for systemic failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always "error"
    pub status: String,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: error.into(),
            message: message.into(),
            execution_id: None,
            session_id: None,
        }
    }

    pub fn with_execution_id(mut self, execution_id: Option<Uuid>) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

pub fn format_batch(state: &PipelineState) -> BatchResponse {
    let status = if state.has_errors() {
        BatchStatus::CompletedWithErrors
    } else {
        BatchStatus::Success
    };

    BatchResponse {
        status,
        execution_id: state.execution_id,
        analysis_result: AnalysisResult::from_state(state),
        ddl_scripts: state.ddl_scripts.clone().unwrap_or_default(),
        pipeline_config: state.pipeline_config.clone().unwrap_or_else(empty_object),
        pipeline_code: state.pipeline_code.clone().unwrap_or_default(),
        report: state.report.clone().unwrap_or_default(),
        execution_stats: state
            .execution_stats
            .clone()
            .unwrap_or_else(|| state.stats()),
        errors: state.errors.clone(),
        warnings: state.warnings.clone(),
    }
}

pub fn format_interactive(state: &PipelineState) -> InteractiveResponse {
    let mut data = match state.current_agent {
        Some(stage) => stage_data(stage, state),
        None => json!({}),
    };

    let status = if state.is_finished() {
        if let Value::Object(ref mut map) = data {
            map.insert(
                "full_results".to_string(),
                serde_json::to_value(format_batch(state)).unwrap_or(Value::Null),
            );
        }
        InteractiveStatus::Completed
    } else if state.waiting_for_feedback {
        InteractiveStatus::WaitingForFeedback
    } else {
        InteractiveStatus::Processing
    };

    InteractiveResponse {
        status,
        session_id: state.session_id.map(|id| id.to_string()),
        current_stage: state
            .current_agent
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        completed_stages: state.completed_agents.clone(),
        data,
        errors: if state.errors.is_empty() {
            None
        } else {
            Some(state.errors.clone())
        },
    }
}

fn stage_data(stage: Stage, state: &PipelineState) -> Value {
    match stage {
        Stage::InputAnalysis => {
            serde_json::to_value(AnalysisResult::from_state(state)).unwrap_or_else(|_| json!({}))
        }
        Stage::DdlGeneration => json!({
            "ddl_scripts": state.ddl_scripts.clone().unwrap_or_default(),
            "ddl_recommendations": state.ddl_recommendations.clone().unwrap_or_else(empty_object),
        }),
        Stage::PipelineGeneration => json!({
            "pipeline_config": state.pipeline_config.clone().unwrap_or_else(empty_object),
            "pipeline_code": state.pipeline_code.clone().unwrap_or_default(),
            "transformations": state.transformations.clone().unwrap_or_default(),
        }),
        Stage::ReportGeneration => json!({
            "report": state.report.clone().unwrap_or_default(),
            "report_sections": state.report_sections.clone().unwrap_or_default(),
            "execution_stats": state.execution_stats.clone().unwrap_or_else(|| state.stats()),
        }),
    }
}
