//! PostgreSQL implementation of the storage ports

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use tracing::info;
use uuid::Uuid;

use super::{AccountRepository, EMAIL_TAKEN, USER_NOT_FOUND, UserStateRepository};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{
    Account, ActivityEntry, NewAccount, UserState, cap_history, default_profile,
    default_progress, default_stats,
};

/// Document columns of the `accounts` table
#[derive(Debug, Clone, Copy)]
enum Document {
    Profile,
    Stats,
    Progress,
    ActivityHistory,
}

impl Document {
    fn column(self) -> &'static str {
        match self {
            Document::Profile => "profile",
            Document::Stats => "stats",
            Document::Progress => "progress",
            Document::ActivityHistory => "activity_history",
        }
    }
}

/// Account and document store backed by the `accounts` table
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace<T>(&self, id: Uuid, document: Document, value: &T) -> DatabaseResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let sql = format!(
            "UPDATE accounts SET {} = $2::json, updated_at = NOW() WHERE id = $1",
            document.column()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(json_text(value)?)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(USER_NOT_FOUND.to_string()));
        }

        Ok(())
    }
}

/// Serialize a document for a `JSON` column. Documents are bound as text so
/// PostgreSQL keeps them verbatim instead of normalizing them as JSONB.
fn json_text<T>(value: &T) -> DatabaseResult<String>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::Query(sqlx::Error::Encode(Box::new(e))))
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn create(&self, new_account: &NewAccount) -> DatabaseResult<Account> {
        info!("Creating new account: {}", new_account.email);

        let history: Vec<ActivityEntry> = Vec::new();
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (id, email, name, password_hash, profile, stats, progress, activity_history)
            VALUES ($1, $2, $3, $4, $5::json, $6::json, $7::json, $8::json)
            RETURNING id, email, name, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_account.email)
        .bind(&new_account.name)
        .bind(&new_account.password_hash)
        .bind(json_text(&default_profile())?)
        .bind(json_text(&default_stats())?)
        .bind(json_text(&default_progress())?)
        .bind(json_text(&history)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_query(e, EMAIL_TAKEN))?;

        account_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }
}

#[async_trait]
impl UserStateRepository for PgStore {
    async fn read(&self, id: Uuid) -> DatabaseResult<UserState> {
        let row = sqlx::query(
            r#"
            SELECT profile, stats, progress, activity_history, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?
        .ok_or_else(|| DatabaseError::NotFound(USER_NOT_FOUND.to_string()))?;

        let decode = |row: &PgRow| -> Result<UserState, sqlx::Error> {
            let Json(activity_history): Json<Vec<ActivityEntry>> =
                row.try_get("activity_history")?;
            Ok(UserState {
                profile: row.try_get("profile")?,
                stats: row.try_get("stats")?,
                progress: row.try_get("progress")?,
                activity_history,
                updated_at: row.try_get("updated_at")?,
            })
        };

        decode(&row).map_err(DatabaseError::Query)
    }

    async fn write_profile(&self, id: Uuid, profile: &Value) -> DatabaseResult<()> {
        self.replace(id, Document::Profile, profile).await
    }

    async fn write_stats(&self, id: Uuid, stats: &Value) -> DatabaseResult<()> {
        self.replace(id, Document::Stats, stats).await
    }

    async fn write_progress(&self, id: Uuid, progress: &Value) -> DatabaseResult<()> {
        self.replace(id, Document::Progress, progress).await
    }

    async fn write_activity_history(
        &self,
        id: Uuid,
        history: &[ActivityEntry],
    ) -> DatabaseResult<()> {
        let capped = cap_history(history.to_vec());
        info!("Replacing activity history for {} ({} entries)", id, capped.len());
        self.replace(id, Document::ActivityHistory, capped.as_slice()).await
    }
}
