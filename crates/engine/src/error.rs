//! HTTP error mapping for API handlers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use risk_lib::EngineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Engine(err) => match err {
                EngineError::InsufficientData { .. } => {
                    (StatusCode::BAD_REQUEST, "INSUFFICIENT_DATA", err.to_string())
                }
                EngineError::InvalidConfig(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIG", err.to_string())
                }
                EngineError::ModelUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE", err.to_string())
                }
                other => {
                    tracing::error!(error = %other, "Internal engine error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        other.to_string(),
                    )
                }
            },
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
