//! File-backed fallback used when no API is configured
//!
//! The whole account directory and the current session are kept in one JSON
//! file, rewritten after every change. Meant for local development and
//! demos only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use auth::error::INVALID_CREDENTIALS;
use auth::password::{HashingConfig, PasswordService};
use auth::validation::{validate_email, validate_name, validate_password};
use chrono::{DateTime, Utc};
use common::models::{
    ActivityEntry, UserView, cap_history, default_profile, default_progress, default_stats,
};
use common::repositories::{EMAIL_TAKEN, USER_NOT_FOUND};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{BackendMode, StudyBackend};
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalAccount {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    profile: Value,
    stats: Value,
    progress: Value,
    #[serde(default)]
    activity_history: Vec<ActivityEntry>,
    created_at: DateTime<Utc>,
}

impl LocalAccount {
    fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            profile: self.profile.clone(),
            stats: self.stats.clone(),
            progress: self.progress.clone(),
            activity_history: self.activity_history.clone(),
            created_at: self.created_at,
        }
    }
}

/// Contents of the store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalData {
    /// Accounts keyed by email
    #[serde(default)]
    accounts: BTreeMap<String, LocalAccount>,
    /// Email of the signed-in account
    #[serde(default)]
    session: Option<String>,
}

impl LocalData {
    fn session_account(&mut self) -> ClientResult<&mut LocalAccount> {
        let email = self.session.clone().ok_or_else(ClientError::no_session)?;
        self.accounts
            .get_mut(&email)
            .ok_or_else(|| ClientError::NotFound(USER_NOT_FOUND.to_string()))
    }
}

/// Local fallback backend
pub struct LocalBackend {
    path: PathBuf,
    data: Mutex<LocalData>,
    passwords: PasswordService,
}

impl LocalBackend {
    /// Open the store at `path`, starting empty when the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ClientError::Storage(format!("Corrupt store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalData::default(),
            Err(e) => return Err(ClientError::Storage(e.to_string())),
        };

        let passwords = PasswordService::new(&HashingConfig::default())
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        info!("Opened local study store at {}", path.display());
        Ok(Self {
            path,
            data: Mutex::new(data),
            passwords,
        })
    }

    /// Use different hashing costs for stored passwords
    pub fn with_password_service(mut self, passwords: PasswordService) -> Self {
        self.passwords = passwords;
        self
    }

    /// Write the store through a temporary file so a crash never leaves a
    /// half-written file behind
    async fn persist(&self, data: &LocalData) -> ClientResult<()> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| ClientError::Storage(format!("Failed to encode store: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::Storage(e.to_string()))?;
        }

        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Apply `change` to a copy of the store, write the copy out, and only
    /// then make it current. A failed write leaves memory and file unchanged.
    async fn commit<T, F>(&self, change: F) -> ClientResult<T>
    where
        T: Send,
        F: FnOnce(&mut LocalData) -> ClientResult<T> + Send,
    {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let result = change(&mut next)?;

        self.persist(&next).await?;
        *data = next;
        Ok(result)
    }

    async fn update_session_account<F>(&self, apply: F) -> ClientResult<()>
    where
        F: FnOnce(&mut LocalAccount) + Send,
    {
        self.commit(|data| {
            apply(data.session_account()?);
            Ok(())
        })
        .await
    }
}

fn validation(message: String) -> ClientError {
    ClientError::Validation(message)
}

#[async_trait]
impl StudyBackend for LocalBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Local
    }

    async fn signup(&self, email: &str, password: &str, name: &str) -> ClientResult<UserView> {
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(ClientError::Validation(
                "Email, password, and name are required".to_string(),
            ));
        }

        validate_email(email).map_err(validation)?;
        validate_password(password).map_err(validation)?;
        validate_name(name).map_err(validation)?;

        if self.data.lock().await.accounts.contains_key(email) {
            return Err(ClientError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let password_hash = self
            .passwords
            .hash(password)
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        let account = LocalAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.trim().to_string(),
            password_hash,
            profile: default_profile(),
            stats: default_stats(),
            progress: default_progress(),
            activity_history: Vec::new(),
            created_at: Utc::now(),
        };
        let view = self
            .commit(move |data| {
                if data.accounts.contains_key(&account.email) {
                    return Err(ClientError::Conflict(EMAIL_TAKEN.to_string()));
                }

                let view = account.view();
                data.session = Some(account.email.clone());
                data.accounts.insert(account.email.clone(), account);
                Ok(view)
            })
            .await?;

        info!("Created local account {}", view.id);
        Ok(view)
    }

    async fn login(&self, email: &str, password: &str) -> ClientResult<UserView> {
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let invalid = || ClientError::Authentication(INVALID_CREDENTIALS.to_string());

        let account = self.data.lock().await.accounts.get(email).cloned();
        let Some(account) = account else {
            self.passwords.verify_dummy(password);
            return Err(invalid());
        };

        let matches = self
            .passwords
            .verify(password, &account.password_hash)
            .map_err(|e| {
                warn!("Unreadable password hash for local account: {}", e);
                invalid()
            })?;
        if !matches {
            return Err(invalid());
        }

        self.commit(move |data| {
            data.session = Some(account.email.clone());
            Ok(account.view())
        })
        .await
    }

    async fn logout(&self) -> ClientResult<()> {
        self.commit(|data| {
            data.session = None;
            Ok(())
        })
        .await
    }

    async fn current_user(&self) -> ClientResult<Option<UserView>> {
        let data = self.data.lock().await;
        Ok(data
            .session
            .as_ref()
            .and_then(|email| data.accounts.get(email))
            .map(LocalAccount::view))
    }

    async fn fetch_user(&self) -> ClientResult<UserView> {
        let mut data = self.data.lock().await;
        Ok(data.session_account()?.view())
    }

    async fn update_profile(&self, profile: Value) -> ClientResult<()> {
        self.update_session_account(move |account| account.profile = profile)
            .await
    }

    async fn update_stats(&self, stats: Value) -> ClientResult<()> {
        self.update_session_account(move |account| account.stats = stats)
            .await
    }

    async fn update_progress(&self, progress: Value) -> ClientResult<()> {
        self.update_session_account(move |account| account.progress = progress)
            .await
    }

    async fn add_activity(&self, entry: ActivityEntry) -> ClientResult<Vec<ActivityEntry>> {
        self.commit(move |data| {
            let account = data.session_account()?;

            let mut history = std::mem::take(&mut account.activity_history);
            history.insert(0, entry);
            account.activity_history = cap_history(history);
            Ok(account.activity_history.clone())
        })
        .await
    }
}
