//! Error type for signup and login

use thiserror::Error;

/// Message shared by "no such account" and "wrong password"
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
/// Message returned to rate-limited clients
pub const RATE_LIMITED: &str = "Too many authentication attempts, please try again later";

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Email already registered
    #[error("{0}")]
    Conflict(String),

    /// Unknown email or wrong password
    #[error("{}", INVALID_CREDENTIALS)]
    InvalidCredentials,

    /// Too many attempts from the same client
    #[error("{}", RATE_LIMITED)]
    RateLimited,

    /// Anything else; details are logged, never returned
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;
