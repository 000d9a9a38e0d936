use async_trait::async_trait;
use etl_core::{ChatMessage, Stage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use super::client::LlmClient;
use super::fallback::FallbackClient;
use super::ollama::OllamaClient;
use crate::config::OllamaConfig;
use crate::error::LlmResult;

/// Builds the client for a `(stage, use_tools)` slot on first use.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn create(&self, stage: Stage, use_tools: bool) -> LlmResult<Arc<dyn LlmClient>>;
}

/// Provider of [`FallbackClient`]s, optionally failing for chosen stages.
#[derive(Debug, Clone, Default)]
pub struct FallbackProvider {
    failing: HashSet<Stage>,
}

impl FallbackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, stage: Stage) -> Self {
        self.failing.insert(stage);
        self
    }

    pub fn client(&self, stage: Stage) -> Arc<dyn LlmClient> {
        if self.failing.contains(&stage) {
            Arc::new(FallbackClient::failing(stage))
        } else {
            Arc::new(FallbackClient::new(stage))
        }
    }
}

#[async_trait]
impl ModelProvider for FallbackProvider {
    async fn create(&self, stage: Stage, _use_tools: bool) -> LlmResult<Arc<dyn LlmClient>> {
        Ok(self.client(stage))
    }
}

/// Provider of [`OllamaClient`]s.
///
/// A new client is probed with a one-message request. When Ollama is
/// disabled, unreachable or rejects the probe, the fallback is used instead.
pub struct OllamaProvider {
    config: OllamaConfig,
    fallback: FallbackProvider,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            fallback: FallbackProvider::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn create(&self, stage: Stage, _use_tools: bool) -> LlmResult<Arc<dyn LlmClient>> {
        if !self.config.enabled {
            info!(stage = %stage, "Ollama disabled, using fallback model");
            return Ok(self.fallback.client(stage));
        }

        let model = self.config.model_for(stage);
        let client = match OllamaClient::new(&self.config, model) {
            Ok(client) => client,
            Err(e) => {
                warn!(stage = %stage, error = %e, "Failed to build Ollama client, using fallback model");
                return Ok(self.fallback.client(stage));
            }
        };

        match client.invoke(&[ChatMessage::user("ping")]).await {
            Ok(_) => {
                info!(stage = %stage, model = %model, "Ollama model ready");
                Ok(Arc::new(client))
            }
            Err(e) => {
                warn!(stage = %stage, model = %model, error = %e, "Ollama probe failed, using fallback model");
                Ok(self.fallback.client(stage))
            }
        }
    }
}

/// Provider that hands out one fixed client for every slot.
pub struct StaticProvider {
    client: Arc<dyn LlmClient>,
}

impl StaticProvider {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelProvider for StaticProvider {
    async fn create(&self, _stage: Stage, _use_tools: bool) -> LlmResult<Arc<dyn LlmClient>> {
        Ok(Arc::clone(&self.client))
    }
}

type CacheKey = (Stage, bool);
type ClientCell = Arc<OnceCell<Arc<dyn LlmClient>>>;

/// Cache of model clients keyed by `(stage, use_tools)`.
///
/// Each slot is initialized at most once, even under concurrent first access.
/// A failed initialization leaves the slot empty so the next caller retries.
pub struct ModelManager {
    provider: Arc<dyn ModelProvider>,
    cache: Mutex<HashMap<CacheKey, ClientCell>>,
}

impl ModelManager {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &OllamaConfig) -> Self {
        Self::new(Arc::new(OllamaProvider::new(config.clone())))
    }

    pub fn fallback() -> Self {
        Self::new(Arc::new(FallbackProvider::new()))
    }

    pub async fn client_for(&self, stage: Stage, use_tools: bool) -> LlmResult<Arc<dyn LlmClient>> {
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry((stage, use_tools)).or_default())
        };

        let client = cell
            .get_or_try_init(|| self.provider.create(stage, use_tools))
            .await?;
        Ok(Arc::clone(client))
    }

    /// Number of initialized slots.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|cell| cell.initialized()).count()
    }
}
