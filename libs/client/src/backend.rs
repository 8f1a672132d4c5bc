//! The contract the UI programs against

use async_trait::async_trait;
use common::models::{ActivityEntry, UserView};
use serde_json::Value;

use crate::error::ClientResult;

/// Which implementation is serving the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Remote,
    Local,
}

/// Account, session and document operations.
///
/// Signup and login open a session held by the backend; every other call
/// acts on that session. Document updates replace the whole document.
#[async_trait]
pub trait StudyBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    async fn signup(&self, email: &str, password: &str, name: &str) -> ClientResult<UserView>;

    async fn login(&self, email: &str, password: &str) -> ClientResult<UserView>;

    /// Drop the session. Remote tokens stay valid server side until expiry.
    async fn logout(&self) -> ClientResult<()>;

    /// Snapshot of the signed-in user without a round trip
    async fn current_user(&self) -> ClientResult<Option<UserView>>;

    /// Authoritative copy of the signed-in user
    async fn fetch_user(&self) -> ClientResult<UserView>;

    async fn update_profile(&self, profile: Value) -> ClientResult<()>;

    async fn update_stats(&self, stats: Value) -> ClientResult<()>;

    async fn update_progress(&self, progress: Value) -> ClientResult<()>;

    /// Prepend an entry to the activity history and return the stored list
    async fn add_activity(&self, entry: ActivityEntry) -> ClientResult<Vec<ActivityEntry>>;

    /// Release per-process session state at application teardown
    async fn close(&self) -> ClientResult<()> {
        Ok(())
    }
}
