//! Error types for folio-ps
//!
//! Client-caused failures (validation, identity, unknown article) are
//! returned as-is; only write conflicts are retried, and they surface here
//! as `RetriesExhausted` once the retry budget is spent.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use folio_common::api::ErrorBody;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or out-of-range value (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Caller identity could not be resolved (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller resolved but not allowed, e.g. banned (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown article (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Write conflicts persisted through every retry attempt (500)
    #[error("Write conflict persisted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Non-conflict storage failure, not retried (500)
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RetriesExhausted { .. }
            | ApiError::Persistence(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            ApiError::Persistence(_) => "PERSISTENCE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<folio_common::Error> for ApiError {
    fn from(err: folio_common::Error) -> Self {
        match err {
            folio_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            folio_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            folio_common::Error::Database(e) => ApiError::Persistence(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // A bare conflict only reaches here from paths without a retry loop
        ApiError::Persistence(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), "{}", self);
        }

        let body = Json(ErrorBody::new(self.code(), self.to_string()));
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
