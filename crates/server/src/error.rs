use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::{AnalysisFailure, ErrorResponse, FailureKind};

#[derive(Debug)]
pub enum AppError {
    Analysis(AnalysisFailure),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Analysis(failure) => {
                let status = match failure.kind {
                    FailureKind::NotFound => StatusCode::NOT_FOUND,
                    FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
                    FailureKind::Systemic => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, failure.body)
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(msg, "Invalid request body"),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AnalysisFailure> for AppError {
    fn from(failure: AnalysisFailure) -> Self {
        AppError::Analysis(failure)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
