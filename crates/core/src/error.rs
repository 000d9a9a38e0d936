use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
