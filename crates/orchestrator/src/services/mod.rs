pub mod analysis_service;
pub mod executor_context;

pub use analysis_service::{AnalysisFailure, AnalysisService, FailureKind};
pub use executor_context::{ExecutorConfig, ExecutorContext};
