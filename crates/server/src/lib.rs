pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ETL Studio API",
        version = "0.1.0",
        description = "Staged analysis of data sources: storage advice, DDL, pipeline code and a report"
    ),
    paths(
        routes::health_check,
        routes::analyze,
        routes::analyze_interactive,
        routes::get_session,
        routes::delete_session,
    ),
    components(schemas(
        routes::HealthResponse,
        etl_core::AnalysisRequest,
        etl_core::InteractiveRequest,
        etl_core::Stage,
        etl_core::DdlScript,
        etl_core::ExecutionStats,
        etl_core::StageError,
        etl_core::StageWarning,
        orchestrator::response::AnalysisResult,
        orchestrator::response::BatchStatus,
        orchestrator::response::InteractiveStatus,
        orchestrator::BatchResponse,
        orchestrator::InteractiveResponse,
        orchestrator::ErrorResponse,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "analysis", description = "Batch and interactive analysis"),
        (name = "sessions", description = "Stored interactive sessions"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/api/v1/analyze", post(routes::analyze))
        .route(
            "/api/v1/analyze/interactive",
            post(routes::analyze_interactive),
        )
        .route(
            "/api/v1/sessions/{id}",
            get(routes::get_session).delete(routes::delete_session),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
