//! Authentication for the CSP Study Hub API
//!
//! Session tokens, password hashing, input validation, the sliding-window
//! rate limiter and the signup/login orchestration built on top of them.

pub mod error;
pub mod jwt;
pub mod password;
pub mod rate_limiter;
pub mod service;
pub mod validation;

pub use error::AuthError;
pub use jwt::{Claims, JwtConfig, JwtService, TokenError};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use service::AuthService;
