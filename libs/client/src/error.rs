//! Errors surfaced to the UI by either backend

use thiserror::Error;

/// Client-side error. Both backends report the same variants and messages
/// for the same situation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Email already registered
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials
    #[error("{0}")]
    Authentication(String),

    /// No session: never logged in, or logged out
    #[error("{0}")]
    Unauthenticated(String),

    /// Session rejected: token stale or forged
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    NotFound(String),

    /// The server could not be reached or did not answer in time
    #[error("Unable to reach the study server: {0}")]
    Unreachable(String),

    /// The server failed or answered with something unexpected
    #[error("{0}")]
    Server(String),

    /// The local fallback store could not be read or written
    #[error("Local storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Map an HTTP error status and its `error` message onto a variant
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 if message == common::repositories::EMAIL_TAKEN => ClientError::Conflict(message),
            400 | 422 => ClientError::Validation(message),
            401 if message == auth::error::INVALID_CREDENTIALS => {
                ClientError::Authentication(message)
            }
            401 => ClientError::Unauthenticated(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            429 => ClientError::RateLimited(message),
            _ => ClientError::Server(message),
        }
    }

    /// No session is held
    pub fn no_session() -> Self {
        ClientError::Unauthenticated("Access token required".to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
