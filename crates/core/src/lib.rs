//! Domain types shared by the stage pipeline, the HTTP server and the CLI.

pub mod domain;
pub mod error;

pub use domain::message::{ChatMessage, Role};
pub use domain::request::{AnalysisRequest, InteractiveRequest};
pub use domain::session_id::SessionId;
pub use domain::stage::{Stage, StageDescriptor, STAGE_TABLE};
pub use domain::state::{
    DdlScript, ExecutionStats, OpaqueValue, PipelineState, StageError, StageWarning, StateValue,
};
pub use error::CoreError;
