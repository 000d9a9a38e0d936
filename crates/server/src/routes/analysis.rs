use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use etl_core::{AnalysisRequest, InteractiveRequest};
use orchestrator::{BatchResponse, ErrorResponse, InteractiveResponse};

use crate::error::AppError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "All stages ran; see status for recorded errors", body = BatchResponse),
        (status = 400, description = "Invalid analysis request", body = ErrorResponse),
        (status = 500, description = "Analysis failed", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let Json(request) = payload?;
    let response = state.service.analyze(request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/analyze/interactive",
    request_body = InteractiveRequest,
    responses(
        (status = 200, description = "One stage ran", body = InteractiveResponse),
        (status = 400, description = "Invalid request or session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Step failed", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze_interactive(
    State(state): State<AppState>,
    payload: Result<Json<InteractiveRequest>, JsonRejection>,
) -> Result<Json<InteractiveResponse>, AppError> {
    let Json(request) = payload?;
    let response = state.service.analyze_interactive(request).await?;
    Ok(Json(response))
}
