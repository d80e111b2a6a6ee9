use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use beonyeok_core::PipelineError;
use serde_json::json;
use tracing::error;

pub type Result<T> = core::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid webhook secret".into()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(reason) => ApiError::BadRequest(reason),
            PipelineError::NotFound { video_id } => {
                ApiError::NotFound(format!("No record for {}", video_id))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
