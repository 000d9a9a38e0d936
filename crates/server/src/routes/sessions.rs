use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use orchestrator::{ErrorResponse, InteractiveResponse};

use crate::error::AppError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Current state of the session", body = InteractiveResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InteractiveResponse>, AppError> {
    let snapshot = state.service.session_snapshot(&id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
