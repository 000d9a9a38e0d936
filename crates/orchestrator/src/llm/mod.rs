//! Language model access for the stage executor.
//!
//! - [`LlmClient`] - one model endpoint, `invoke(messages) -> response`
//! - [`OllamaClient`] - HTTP client for a local Ollama server
//! - [`FallbackClient`] - deterministic canned answers, used when no model is reachable
//! - [`ModelManager`] - per-process cache of clients keyed by `(stage, use_tools)`

mod client;
mod fallback;
mod manager;
mod ollama;

pub use client::{LlmClient, LlmResponse};
pub use fallback::FallbackClient;
pub use manager::{FallbackProvider, ModelManager, ModelProvider, OllamaProvider, StaticProvider};
pub use ollama::OllamaClient;
