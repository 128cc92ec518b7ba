//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::downloader::DownloadError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine failure plus a human-oriented context message
    #[error("{source}")]
    Engine {
        source: DownloadError,
        message: Option<String>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach a context message shown next to the error
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Engine { source, .. } => Self::Engine {
                source,
                message: Some(message.into()),
            },
            other => other,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Engine { source, .. } if source.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Engine { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(source: DownloadError) -> Self {
        Self::Engine {
            source,
            message: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            match &self {
                ApiError::Internal(detail) => error!(detail = %detail, "internal error"),
                other => error!(error = %other, "request failed"),
            }
        }

        let message = match &self {
            ApiError::Engine { message, .. } => message.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
