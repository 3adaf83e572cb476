// API errors - Mapping of failures to JSON error responses
use crate::application::query_backend::BackendError;
use crate::domain::filter::FilterError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("dashboard not found: {0}")]
    DashboardNotFound(String),

    #[error("tile not found: {0}")]
    TileNotFound(String),

    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error(transparent)]
    Query(#[from] BackendError),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DashboardNotFound(_) | ApiError::TileNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            ApiError::Query(BackendError::Query(_)) => StatusCode::BAD_REQUEST,
            ApiError::Query(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}

impl From<StatusCode> for ApiError {
    fn from(_: StatusCode) -> Self {
        ApiError::Internal
    }
}
