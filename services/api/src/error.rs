//! Custom error types for the API service

use auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{error::DatabaseError, models::ErrorBody};
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Duplicate unique field
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials
    #[error("{}", auth::error::INVALID_CREDENTIALS)]
    InvalidCredentials,

    /// No bearer token on a protected route
    #[error("Access token required")]
    MissingToken,

    /// Bearer token with a bad signature, bad encoding or past its expiry
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{}", auth::error::RATE_LIMITED)]
    RateLimited,

    #[error("{0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::Validation(msg),
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::RateLimited => ApiError::RateLimited,
            AuthError::Internal(e) => {
                error!("Authentication failed internally: {:#}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::NotFound(msg),
            DatabaseError::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                error!("Database operation failed: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
