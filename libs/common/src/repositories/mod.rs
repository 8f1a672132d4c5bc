//! Storage ports for accounts and per-account documents
//!
//! The credential side (`AccountRepository`) and the document side
//! (`UserStateRepository`) are separate traits so the auth service only sees
//! what it needs. Both are implemented over the same `accounts` row by
//! [`PgStore`] and by the in-memory [`MemoryStore`].

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{Account, ActivityEntry, NewAccount, UserState};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Message reported when an email is already registered
pub const EMAIL_TAKEN: &str = "Email already exists";
/// Message reported when an account row is missing
pub const USER_NOT_FOUND: &str = "User not found";

/// Credential store
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account together with its default documents
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account>;

    /// Exact, case-sensitive email lookup
    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>>;
}

/// User state store. Every write replaces the whole document (last writer
/// wins) and stamps `updated_at`.
#[async_trait]
pub trait UserStateRepository: Send + Sync {
    async fn read(&self, id: Uuid) -> DatabaseResult<UserState>;

    async fn write_profile(&self, id: Uuid, profile: &Value) -> DatabaseResult<()>;

    async fn write_stats(&self, id: Uuid, stats: &Value) -> DatabaseResult<()>;

    async fn write_progress(&self, id: Uuid, progress: &Value) -> DatabaseResult<()>;

    /// Replace the activity history, keeping the most recent entries only
    async fn write_activity_history(
        &self,
        id: Uuid,
        history: &[ActivityEntry],
    ) -> DatabaseResult<()>;
}
