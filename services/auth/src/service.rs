//! Signup and login orchestration

use std::sync::Arc;

use common::error::DatabaseError;
use common::models::{AuthResponse, LoginRequest, NewAccount, SignupRequest, UserView};
use common::repositories::{AccountRepository, UserStateRepository};
use tracing::{error, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::password::PasswordService;
use crate::rate_limiter::RateLimiter;
use crate::validation::{required, validate_email, validate_name, validate_password};

/// Auth service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    states: Arc<dyn UserStateRepository>,
    jwt_service: JwtService,
    passwords: PasswordService,
    rate_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        states: Arc<dyn UserStateRepository>,
        jwt_service: JwtService,
        passwords: PasswordService,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            accounts,
            states,
            jwt_service,
            passwords,
            rate_limiter,
        }
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Create an account and open a session for it.
    ///
    /// `client_key` identifies the caller for rate limiting; signup and login
    /// draw from the same window.
    pub async fn signup(&self, client_key: &str, request: &SignupRequest) -> AuthResult<AuthResponse> {
        self.check_rate_limit(client_key).await?;

        let (Some(email), Some(password), Some(name)) = (
            required(&request.email),
            required(&request.password),
            required(&request.name),
        ) else {
            return Err(AuthError::Validation(
                "Email, password, and name are required".to_string(),
            ));
        };

        validate_email(email).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;
        validate_name(name).map_err(AuthError::Validation)?;

        let password_hash = self.passwords.hash(password)?;
        let account = self
            .accounts
            .create(&NewAccount {
                email: email.to_string(),
                name: name.trim().to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(msg) => {
                    info!("Signup rejected, email already registered: {}", email);
                    AuthError::Conflict(msg)
                }
                other => {
                    error!("Failed to create account: {}", other);
                    AuthError::Internal(other.into())
                }
            })?;

        let response = self.open_session(&account).await?;
        info!("Account {} created for {}", account.id, account.email);
        Ok(response)
    }

    /// Check credentials and open a new session. Earlier tokens stay valid.
    pub async fn login(&self, client_key: &str, request: &LoginRequest) -> AuthResult<AuthResponse> {
        self.check_rate_limit(client_key).await?;

        let (Some(email), Some(password)) = (required(&request.email), required(&request.password))
        else {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        };

        let account = self
            .accounts
            .find_by_email(email)
            .await
            .map_err(|e| {
                error!("Failed to look up account: {}", e);
                AuthError::Internal(e.into())
            })?;

        let Some(account) = account else {
            self.passwords.verify_dummy(password);
            info!("Login failed for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &account.password_hash)? {
            info!("Login failed for account {}", account.id);
            return Err(AuthError::InvalidCredentials);
        }

        let response = self.open_session(&account).await?;
        info!("Account {} logged in", account.id);
        Ok(response)
    }

    async fn check_rate_limit(&self, client_key: &str) -> AuthResult<()> {
        let allowed = self.rate_limiter.is_allowed(client_key).await.map_err(|e| {
            error!("Rate limiter unavailable: {}", e);
            AuthError::Internal(e)
        })?;

        if !allowed {
            warn!("Rejected authentication attempt from {}", client_key);
            return Err(AuthError::RateLimited);
        }

        Ok(())
    }

    async fn open_session(&self, account: &common::models::Account) -> AuthResult<AuthResponse> {
        let token = self.jwt_service.issue(account.id).map_err(|e| {
            error!("Failed to issue token: {}", e);
            AuthError::Internal(e)
        })?;

        let state = self.states.read(account.id).await.map_err(|e| {
            error!("Failed to read user state for {}: {}", account.id, e);
            AuthError::Internal(e.into())
        })?;

        Ok(AuthResponse {
            token,
            user: UserView::new(account, state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtConfig;
    use crate::password::HashingConfig;
    use crate::rate_limiter::RateLimiterConfig;
    use common::repositories::MemoryStore;

    fn service_with_limit(max_attempts: u32) -> AuthService {
        let store = Arc::new(MemoryStore::new());
        AuthService::new(
            store.clone(),
            store,
            JwtService::new(JwtConfig::new("test-secret")).unwrap(),
            PasswordService::new(&HashingConfig {
                memory_kib: 8 * 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
            RateLimiter::new(RateLimiterConfig {
                max_attempts,
                window_seconds: 900,
            }),
        )
    }

    fn service() -> AuthService {
        service_with_limit(100)
    }

    fn signup_request(email: &str, password: &str, name: &str) -> SignupRequest {
        SignupRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            name: Some(name.to_string()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_signup_token_identifies_new_account() {
        let auth = service();
        let response = auth
            .signup("client", &signup_request("a@x.com", "secret1", "Ann"))
            .await
            .unwrap();

        assert_eq!(response.user.email, "a@x.com");
        assert_eq!(response.user.name, "Ann");
        assert_eq!(
            auth.jwt_service().verify(&response.token),
            Ok(response.user.id)
        );

        let login = auth
            .login("client", &login_request("a@x.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(login.user.id, response.user.id);
        assert_ne!(login.token, response.token);
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let auth = service();
        auth.signup("client", &signup_request("a@x.com", "secret1", "Ann"))
            .await
            .unwrap();

        let err = auth
            .signup("client", &signup_request("a@x.com", "secret1", "Ann"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(ref msg) if msg == "Email already exists"));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let auth = service();

        let err = auth
            .signup("client", &signup_request("a@x.com", "short", "Ann"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");

        let err = auth
            .signup(
                "client",
                &SignupRequest {
                    email: Some("a@x.com".to_string()),
                    password: Some("secret1".to_string()),
                    name: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email, password, and name are required");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service();
        auth.signup("client", &signup_request("a@x.com", "secret1", "Ann"))
            .await
            .unwrap();

        let wrong_password = auth
            .login("client", &login_request("a@x.com", "wrong-pass"))
            .await
            .unwrap_err();
        let unknown_email = auth
            .login("client", &login_request("b@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let err = service()
            .login("client", &LoginRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email and password are required");
    }

    #[tokio::test]
    async fn test_sixth_attempt_is_rate_limited_despite_valid_credentials() {
        let auth = service_with_limit(5);
        auth.signup("10.0.0.1", &signup_request("a@x.com", "secret1", "Ann"))
            .await
            .unwrap();

        for _ in 0..4 {
            auth.login("10.0.0.1", &login_request("a@x.com", "secret1"))
                .await
                .unwrap();
        }

        let err = auth
            .login("10.0.0.1", &login_request("a@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RateLimited));

        // Another client is unaffected
        auth.login("10.0.0.2", &login_request("a@x.com", "secret1"))
            .await
            .unwrap();
    }
}
