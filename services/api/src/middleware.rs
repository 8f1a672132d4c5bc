//! Authentication middleware and request context extractors

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Authenticated account, inserted into request extensions
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// No token yields 401 so clients can tell "never logged in" apart from a
/// stale or forged session, which yields 403.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::MissingToken)?;

    let account_id = state.jwt_service.verify(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::InvalidToken
    })?;

    req.extensions_mut().insert(AuthUser { id: account_id });

    Ok(next.run(req).await)
}

/// Address used to key the authentication rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_proxy {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty());

            if let Some(addr) = forwarded {
                return Ok(ClientAddr(addr.to_string()));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientAddr(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}
