//! Backend talking to the HTTP API

use std::time::Duration;

use async_trait::async_trait;
use common::models::{
    ActivityEntry, ActivityUpdate, AuthResponse, ErrorBody, LoginRequest, ProfileUpdate,
    ProgressUpdate, SignupRequest, StatsUpdate, SuccessResponse, UserView, cap_history,
};
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendMode, StudyBackend};
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone)]
struct RemoteSession {
    token: String,
    user: UserView,
}

/// HTTP backend. The token lives in memory only and is gone once the
/// process (or tab) ends.
pub struct RemoteBackend {
    http: Client,
    base_url: String,
    session: RwLock<Option<RemoteSession>>,
}

impl RemoteBackend {
    /// Create a backend for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Server(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await.map_err(|e| {
            warn!("Request to study server failed: {}", e);
            ClientError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Server(format!("Unexpected response: {}", e)));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        debug!("Study server answered {}: {}", status, message);
        Err(ClientError::from_status(status.as_u16(), message))
    }

    async fn token(&self) -> ClientResult<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone())
            .ok_or_else(ClientError::no_session)
    }

    async fn put_document<B: Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<()> {
        let token = self.token().await?;
        let _: SuccessResponse = self
            .send(self.http.put(self.url(path)).bearer_auth(token).json(body))
            .await?;
        Ok(())
    }

    async fn open_session(&self, response: AuthResponse) -> UserView {
        let user = response.user.clone();
        *self.session.write().await = Some(RemoteSession {
            token: response.token,
            user: response.user,
        });
        user
    }

    async fn patch_snapshot<F>(&self, apply: F)
    where
        F: FnOnce(&mut UserView) + Send,
    {
        if let Some(session) = self.session.write().await.as_mut() {
            apply(&mut session.user);
        }
    }
}

#[async_trait]
impl StudyBackend for RemoteBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    async fn signup(&self, email: &str, password: &str, name: &str) -> ClientResult<UserView> {
        let request = SignupRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            name: Some(name.to_string()),
        };
        let response: AuthResponse = self
            .send(self.http.post(self.url("/api/auth/signup")).json(&request))
            .await?;

        info!("Signed up as {}", response.user.email);
        Ok(self.open_session(response).await)
    }

    async fn login(&self, email: &str, password: &str) -> ClientResult<UserView> {
        let request = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let response: AuthResponse = self
            .send(self.http.post(self.url("/api/auth/login")).json(&request))
            .await?;

        info!("Logged in as {}", response.user.email);
        Ok(self.open_session(response).await)
    }

    async fn logout(&self) -> ClientResult<()> {
        *self.session.write().await = None;
        Ok(())
    }

    async fn current_user(&self) -> ClientResult<Option<UserView>> {
        Ok(self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone()))
    }

    async fn fetch_user(&self) -> ClientResult<UserView> {
        let token = self.token().await?;
        let user: UserView = self
            .send(self.http.get(self.url("/api/users/profile")).bearer_auth(token))
            .await?;

        let snapshot = user.clone();
        self.patch_snapshot(move |cached| *cached = snapshot).await;
        Ok(user)
    }

    async fn update_profile(&self, profile: Value) -> ClientResult<()> {
        let body = ProfileUpdate {
            profile: Some(profile.clone()),
        };
        self.put_document("/api/users/profile", &body).await?;
        self.patch_snapshot(move |user| user.profile = profile).await;
        Ok(())
    }

    async fn update_stats(&self, stats: Value) -> ClientResult<()> {
        let body = StatsUpdate {
            stats: Some(stats.clone()),
        };
        self.put_document("/api/users/stats", &body).await?;
        self.patch_snapshot(move |user| user.stats = stats).await;
        Ok(())
    }

    async fn update_progress(&self, progress: Value) -> ClientResult<()> {
        let body = ProgressUpdate {
            progress: Some(progress.clone()),
        };
        self.put_document("/api/users/progress", &body).await?;
        self.patch_snapshot(move |user| user.progress = progress).await;
        Ok(())
    }

    async fn add_activity(&self, entry: ActivityEntry) -> ClientResult<Vec<ActivityEntry>> {
        let mut history = self.fetch_user().await?.activity_history;
        history.insert(0, entry);
        let history = cap_history(history);

        let body = ActivityUpdate {
            activity_history: Some(history.clone()),
        };
        self.put_document("/api/users/activity", &body).await?;

        let stored = history.clone();
        self.patch_snapshot(move |user| user.activity_history = stored)
            .await;
        Ok(history)
    }

    async fn close(&self) -> ClientResult<()> {
        self.logout().await
    }
}
