//! Boot-time backend selection and the session context handed to the UI

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::models::UserView;
use tracing::info;

use crate::backend::{BackendMode, StudyBackend};
use crate::error::ClientResult;
use crate::local::LocalBackend;
use crate::remote::RemoteBackend;

/// Default request timeout for the remote backend
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root; the local fallback is used when absent
    pub backend_url: Option<String>,
    /// File holding the local fallback store
    pub local_store_path: PathBuf,
    /// Request timeout for the remote backend
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            local_store_path: PathBuf::from(".csp-study-hub/local-store.json"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `STUDY_API_URL`: API root; unset or empty selects the local fallback
    /// - `STUDY_LOCAL_STORE`: Path of the local store file
    /// - `STUDY_API_TIMEOUT_SECONDS`: Request timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend_url: std::env::var("STUDY_API_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            local_store_path: std::env::var("STUDY_LOCAL_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_store_path),
            timeout: std::env::var("STUDY_API_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn mode(&self) -> BackendMode {
        match self.backend_url {
            Some(_) => BackendMode::Remote,
            None => BackendMode::Local,
        }
    }
}

/// Build the backend selected by `config`. Called once at startup; the
/// choice is never revisited while the application runs.
pub async fn connect(config: &ClientConfig) -> ClientResult<Arc<dyn StudyBackend>> {
    match &config.backend_url {
        Some(url) => {
            info!("Using study server at {}", url);
            Ok(Arc::new(RemoteBackend::new(url, config.timeout)?))
        }
        None => {
            info!("No study server configured, using the local store");
            Ok(Arc::new(LocalBackend::open(&config.local_store_path).await?))
        }
    }
}

/// Session context passed to the parts of the UI that need identity
#[derive(Clone)]
pub struct ClientContext {
    backend: Arc<dyn StudyBackend>,
}

impl ClientContext {
    /// Select and open the backend for this run
    pub async fn init(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self::from_backend(connect(config).await?))
    }

    pub fn from_backend(backend: Arc<dyn StudyBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn StudyBackend {
        self.backend.as_ref()
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// Signed-in user, if any
    pub async fn user(&self) -> ClientResult<Option<UserView>> {
        self.backend.current_user().await
    }

    pub async fn is_authenticated(&self) -> ClientResult<bool> {
        Ok(self.user().await?.is_some())
    }

    /// Tear down per-run session state
    pub async fn shutdown(self) -> ClientResult<()> {
        info!("Shutting down {:?} client context", self.backend.mode());
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("STUDY_API_URL", "http://localhost:5000");
            std::env::set_var("STUDY_API_TIMEOUT_SECONDS", "3");
            std::env::remove_var("STUDY_LOCAL_STORE");
        }

        let config = ClientConfig::from_env();
        assert_eq!(config.mode(), BackendMode::Remote);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.local_store_path, ClientConfig::default().local_store_path);

        unsafe {
            std::env::set_var("STUDY_API_URL", " ");
            std::env::remove_var("STUDY_API_TIMEOUT_SECONDS");
        }

        let config = ClientConfig::from_env();
        assert_eq!(config.mode(), BackendMode::Local);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        unsafe {
            std::env::remove_var("STUDY_API_URL");
        }
    }
}
