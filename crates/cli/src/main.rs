use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use etl_core::{AnalysisRequest, InteractiveRequest, SessionId};
use orchestrator::config::CONFIG_FILE;
use orchestrator::{AnalysisService, GeneralConfig, ModelManager, SessionStore};
use serde_json::Value;
use server::state::AppState;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "etl-studio")]
#[command(about = "Staged analysis of data sources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run every stage for a request file and print the result
    Run {
        request: PathBuf,

        /// Use canned model answers instead of a model server
        #[arg(long)]
        fallback: bool,
    },
    /// Run the next stage of a session, starting one when --session is absent
    Step {
        #[arg(conflicts_with = "session")]
        request: Option<PathBuf>,

        #[arg(long)]
        session: Option<String>,

        /// Feedback for the next stage, as JSON
        #[arg(long)]
        feedback: Option<String>,

        #[arg(long)]
        fallback: bool,
    },
    /// Delete stored sessions
    Cleanup {
        id: Option<String>,

        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = GeneralConfig::read(&cli.config).await;
    tracing::debug!(path = %cli.config.display(), "Configuration resolved");

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Run { request, fallback } => run(&config, &request, fallback).await,
        Commands::Step {
            request,
            session,
            feedback,
            fallback,
        } => step(&config, request.as_deref(), session, feedback, fallback).await,
        Commands::Cleanup { id, all } => cleanup(&config, id, all).await,
    }
}

async fn serve(mut config: GeneralConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = config.server.bind_addr();
    tracing::info!("Sessions directory: {}", config.sessions.dir.display());
    tracing::info!(
        "Ollama: {} ({})",
        config.llm.ollama.url,
        if config.llm.ollama.enabled { "enabled" } else { "disabled" }
    );
    let state = AppState::from_config(&config).await;

    println!();
    println!("ETL Studio");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://{}", addr);
    println!("  Swagger UI:  http://{}/swagger-ui", addr);
    println!("  Sessions:    {}", config.sessions.dir.display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    server::serve(state, &addr).await
}

async fn build_service(config: &GeneralConfig, fallback: bool) -> AnalysisService {
    if fallback {
        AnalysisService::with_models(config, ModelManager::fallback())
    } else {
        AnalysisService::from_config(config).await
    }
}

async fn read_json(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn run(config: &GeneralConfig, request_path: &Path, fallback: bool) -> Result<()> {
    let request: AnalysisRequest = serde_json::from_value(read_json(request_path).await?)
        .context("Request is not a valid analysis request")?;

    let service = build_service(config, fallback).await;
    let response = service.analyze(request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn step(
    config: &GeneralConfig,
    request_path: Option<&Path>,
    session: Option<String>,
    feedback: Option<String>,
    fallback: bool,
) -> Result<()> {
    let mut request = match (session, request_path) {
        (Some(session_id), _) => InteractiveRequest::resume(session_id),
        (None, Some(path)) => serde_json::from_value(read_json(path).await?)
            .context("Request is not a valid interactive request")?,
        (None, None) => bail!("Either a request file or --session is required"),
    };

    if let Some(raw) = feedback {
        let feedback: Value = serde_json::from_str(&raw).context("--feedback must be JSON")?;
        request = request.with_feedback(feedback);
    }

    let service = build_service(config, fallback).await;
    let response = service.analyze_interactive(request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cleanup(config: &GeneralConfig, id: Option<String>, all: bool) -> Result<()> {
    let store = SessionStore::new(&config.sessions.dir);

    let ids = match id {
        Some(raw) => vec![SessionId::parse(&raw)?],
        None if all => store.list().await?,
        None => bail!("Pass a session id or --all"),
    };

    if ids.is_empty() {
        println!("No sessions in {}", store.dir().display());
        return Ok(());
    }

    let mut failed = 0;
    for id in &ids {
        match store.delete(id).await {
            Ok(()) => println!("Deleted session {}", id),
            Err(e) => {
                tracing::warn!("Failed to delete session {}: {}", id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} sessions could not be deleted", failed, ids.len());
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
