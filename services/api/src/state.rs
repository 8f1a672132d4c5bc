//! Application state shared across handlers

use std::sync::Arc;

use auth::{AuthService, JwtService, RateLimiter, password::PasswordService};
use common::repositories::{AccountRepository, UserStateRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub jwt_service: JwtService,
    pub accounts: Arc<dyn AccountRepository>,
    pub user_states: Arc<dyn UserStateRepository>,
    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl AppState {
    /// Build the state around a store implementing both storage ports
    pub fn new<S>(
        store: S,
        jwt_service: JwtService,
        passwords: PasswordService,
        rate_limiter: RateLimiter,
    ) -> Self
    where
        S: AccountRepository + UserStateRepository + 'static,
    {
        let store = Arc::new(store);
        let accounts: Arc<dyn AccountRepository> = store.clone();
        let user_states: Arc<dyn UserStateRepository> = store;

        Self {
            auth_service: AuthService::new(
                accounts.clone(),
                user_states.clone(),
                jwt_service.clone(),
                passwords,
                rate_limiter,
            ),
            jwt_service,
            accounts,
            user_states,
            trust_proxy: false,
        }
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}
