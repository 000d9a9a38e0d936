use async_trait::async_trait;
use etl_core::ChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::client::{LlmClient, LlmResponse};
use crate::config::OllamaConfig;
use crate::error::{LlmError, LlmResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

/// Client for the Ollama `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig, model: impl Into<String>) -> LlmResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn invoke(&self, messages: &[ChatMessage]) -> LlmResult<LlmResponse> {
        debug!(
            "Creating chat completion with {} messages, model {}",
            messages.len(),
            self.model
        );

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorBody>(&error_text)
                .map(|body| body.error)
                .unwrap_or(error_text);
            error!(status = status.as_u16(), "Ollama API error: {}", message);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        if chat.message.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse(self.model.clone()));
        }

        Ok(LlmResponse {
            content: chat.message.content,
            model: chat.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OllamaConfig {
        OllamaConfig {
            url: server.uri(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invoke_posts_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "qwen2.5:14b",
                "stream": false,
                "options": {"num_predict": 4096},
                "messages": [{"role": "system", "content": "be brief"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen2.5:14b",
                "message": {"role": "assistant", "content": "hello"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server), "qwen2.5:14b").unwrap();
        let response = client
            .invoke(&[ChatMessage::system("be brief")])
            .await
            .unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(response.model, "qwen2.5:14b");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server), "missing:1b").unwrap();
        let err = client.invoke(&[ChatMessage::user("hi")]).await.unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_content_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "  "}
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server), "qwen2.5:14b").unwrap();
        let err = client.invoke(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let config = OllamaConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let client = OllamaClient::new(&config, "qwen2.5:14b").unwrap();
        let err = client.invoke(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
    }
}
