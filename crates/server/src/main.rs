use anyhow::Result;
use orchestrator::config::CONFIG_FILE;
use orchestrator::GeneralConfig;
use server::state::AppState;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = GeneralConfig::read(Path::new(CONFIG_FILE)).await;
    let state = AppState::from_config(&config).await;
    server::serve(state, &config.server.bind_addr()).await
}
