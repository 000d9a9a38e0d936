pub mod config;
pub mod core;
pub mod error;
pub mod files;
pub mod llm;
pub mod parsing;
pub mod phases;
pub mod prompts;
pub mod response;
pub mod runner;
pub mod services;
pub mod session_store;
pub mod state_machine;

pub use config::GeneralConfig;
pub use self::core::{PhaseOutcome, StageExecutor, StageOutcome, StagePhase};
pub use error::{LlmError, OrchestratorError, Result};
pub use llm::{LlmClient, ModelManager};
pub use response::{BatchResponse, ErrorResponse, InteractiveResponse};
pub use runner::PipelineRunner;
pub use services::{AnalysisFailure, AnalysisService, ExecutorConfig, ExecutorContext, FailureKind};
pub use session_store::SessionStore;
pub use state_machine::{PipelineStateMachine, RunStatus};
