//! HTTP API for the CSP Study Hub
//!
//! Signup and login, plus bearer-authenticated endpoints reading and
//! replacing each account's profile, stats, progress and activity history.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{cors_layer, create_router};
pub use state::AppState;
