use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use survey::SurveyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Logged in full, reported to the client as `public`.
    #[error("{public}: {detail}")]
    Internal { public: &'static str, detail: String },
}

impl ApiError {
    pub fn internal(public: &'static str, detail: impl ToString) -> Self {
        ApiError::Internal { public, detail: detail.to_string() }
    }

    /// Map a library error, using `public` as the message for failures that
    /// are not the caller's fault.
    pub fn from_survey(e: SurveyError, public: &'static str) -> Self {
        match e {
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            e @ SurveyError::EmptyDataset => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::internal(public, e),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::internal("Internal server error", format!("storage task failed: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal { public, detail } => {
                tracing::error!(error = %detail, "{public}");
                public.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
