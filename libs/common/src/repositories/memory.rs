//! In-memory implementation of the storage ports
//!
//! Used by the test suites and by local development runs that start the API
//! without PostgreSQL. Semantics match [`super::PgStore`].

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountRepository, EMAIL_TAKEN, USER_NOT_FOUND, UserStateRepository};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{
    Account, ActivityEntry, NewAccount, UserState, cap_history, default_profile,
    default_progress, default_stats,
};

#[derive(Debug, Clone)]
struct Record {
    account: Account,
    state: UserState,
}

/// Account and document store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Uuid, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account row, leaving any issued tokens dangling
    pub async fn remove(&self, id: Uuid) -> bool {
        self.records.write().await.remove(&id).is_some()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> DatabaseResult<()>
    where
        F: FnOnce(&mut UserState) + Send,
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(USER_NOT_FOUND.to_string()))?;

        let now = Utc::now();
        apply(&mut record.state);
        record.state.updated_at = now;
        record.account.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account> {
        let mut records = self.records.write().await;

        if records
            .values()
            .any(|record| record.account.email == new_account.email)
        {
            return Err(DatabaseError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: new_account.email.clone(),
            name: new_account.name.clone(),
            password_hash: new_account.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };

        records.insert(
            account.id,
            Record {
                account: account.clone(),
                state: UserState {
                    profile: default_profile(),
                    stats: default_stats(),
                    progress: default_progress(),
                    activity_history: Vec::new(),
                    updated_at: now,
                },
            },
        );

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|record| record.account.email == email)
            .map(|record| record.account.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>> {
        let records = self.records.read().await;
        Ok(records.get(&id).map(|record| record.account.clone()))
    }
}

#[async_trait]
impl UserStateRepository for MemoryStore {
    async fn read(&self, id: Uuid) -> DatabaseResult<UserState> {
        let records = self.records.read().await;
        records
            .get(&id)
            .map(|record| record.state.clone())
            .ok_or_else(|| DatabaseError::NotFound(USER_NOT_FOUND.to_string()))
    }

    async fn write_profile(&self, id: Uuid, profile: &Value) -> DatabaseResult<()> {
        let profile = profile.clone();
        self.update(id, move |state| state.profile = profile).await
    }

    async fn write_stats(&self, id: Uuid, stats: &Value) -> DatabaseResult<()> {
        let stats = stats.clone();
        self.update(id, move |state| state.stats = stats).await
    }

    async fn write_progress(&self, id: Uuid, progress: &Value) -> DatabaseResult<()> {
        let progress = progress.clone();
        self.update(id, move |state| state.progress = progress).await
    }

    async fn write_activity_history(
        &self,
        id: Uuid,
        history: &[ActivityEntry],
    ) -> DatabaseResult<()> {
        let history = cap_history(history.to_vec());
        self.update(id, move |state| state.activity_history = history)
            .await
    }
}
