use async_trait::async_trait;
use etl_core::ChatMessage;

use crate::error::LlmResult;

/// A completed model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }
}

/// A text-generation endpoint.
///
/// Implementations must fail rather than hang; the executor relies on every
/// call returning.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage]) -> LlmResult<LlmResponse>;

    fn model_name(&self) -> &str;
}
