//! Shared data model
//!
//! Accounts, the three per-account JSON documents, activity history and the
//! JSON bodies exchanged between the API and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Number of activity entries kept per account, newest first
pub const ACTIVITY_HISTORY_LIMIT: usize = 50;

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New account creation payload
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// One entry of the study activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub duration_minutes: u32,
    pub category: String,
}

/// Per-account documents, each replaced wholesale on write
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub profile: Value,
    pub stats: Value,
    pub progress: Value,
    pub activity_history: Vec<ActivityEntry>,
    pub updated_at: DateTime<Utc>,
}

pub fn default_profile() -> Value {
    json!({
        "avatar": null,
        "bio": "",
        "studyStreak": 0,
        "totalStudyTime": 0,
        "toolsUsed": []
    })
}

pub fn default_stats() -> Value {
    json!({
        "totalQuestions": 0,
        "correctAnswers": 0,
        "streak": 0,
        "unitsCompleted": []
    })
}

pub fn default_progress() -> Value {
    json!({
        "toolsUsed": [],
        "recentActivities": [],
        "unitsProgress": {},
        "flashcardsProgress": {}
    })
}

/// Truncate a newest-first history to [`ACTIVITY_HISTORY_LIMIT`] entries
pub fn cap_history(mut history: Vec<ActivityEntry>) -> Vec<ActivityEntry> {
    history.truncate(ACTIVITY_HISTORY_LIMIT);
    history
}

/// User view returned by the profile endpoint and the auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile: Value,
    pub stats: Value,
    pub progress: Value,
    pub activity_history: Vec<ActivityEntry>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub fn new(account: &Account, state: UserState) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            profile: state.profile,
            stats: state.stats,
            progress: state.progress,
            activity_history: state.activity_history,
            created_at: account.created_at,
        }
    }
}

/// Request for account creation. Fields are optional so missing ones can be
/// reported as validation failures rather than decoding errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Request for login
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response for signup and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub stats: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub activity_history: Option<Vec<ActivityEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> ActivityEntry {
        ActivityEntry {
            timestamp: Utc::now(),
            description: format!("Quiz {}", n),
            duration_minutes: 5,
            category: "quiz".to_string(),
        }
    }

    #[test]
    fn test_cap_history_keeps_newest() {
        let history: Vec<_> = (0..60).map(entry).collect();
        let capped = cap_history(history);
        assert_eq!(capped.len(), ACTIVITY_HISTORY_LIMIT);
        assert_eq!(capped[0].description, "Quiz 0");
        assert_eq!(capped[49].description, "Quiz 49");
    }

    #[test]
    fn test_activity_entry_uses_camel_case() {
        let value = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(value["durationMinutes"], 5);
        assert!(value.get("duration_minutes").is_none());
    }

    #[test]
    fn test_default_stats_shape() {
        let stats = default_stats();
        assert_eq!(stats["totalQuestions"], 0);
        assert_eq!(stats["unitsCompleted"], json!([]));
    }
}
