use orchestrator::{AnalysisService, GeneralConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(service: AnalysisService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub async fn from_config(config: &GeneralConfig) -> Self {
        Self::new(AnalysisService::from_config(config).await)
    }
}
