use etl_core::{CoreError, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn stage_failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            reason: reason.into(),
        }
    }

    /// Short machine-readable name used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::InvalidSessionId(_) => "invalid_session_id",
            Self::InvalidRequest(_) => "invalid_request",
            Self::StageFailed { .. } => "stage_failed",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config_error",
            Self::Llm(_) => "llm_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidSessionId(id) => Self::InvalidSessionId(id),
            CoreError::UnknownStage(stage) => {
                Self::InvalidRequest(format!("unknown stage: {}", stage))
            }
            CoreError::Validation(message) => Self::InvalidRequest(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure of a single language model invocation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty response from model {0}")]
    EmptyResponse(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_request_errors() {
        let err: OrchestratorError = CoreError::InvalidSessionId("x/y".to_string()).into();
        assert!(matches!(err, OrchestratorError::InvalidSessionId(_)));
        assert_eq!(err.kind(), "invalid_session_id");

        let err: OrchestratorError = CoreError::Validation("empty".to_string()).into();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
    }

    #[test]
    fn test_stage_failed_display() {
        let err = OrchestratorError::stage_failed(Stage::DdlGeneration, "boom");
        assert_eq!(err.to_string(), "Stage ddl_generation failed: boom");
    }
}
