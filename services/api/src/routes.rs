//! API service routes

use std::any::Any;

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use common::models::{
    ActivityUpdate, HealthResponse, LoginRequest, ProfileUpdate, ProgressUpdate, SignupRequest,
    StatsUpdate, SuccessResponse, UserView,
};
use common::repositories::USER_NOT_FOUND;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, ClientAddr, auth_middleware},
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/users/profile", get(get_profile).put(update_profile))
        .route("/api/users/stats", put(update_stats))
        .route("/api/users/progress", put(update_progress))
        .route("/api/users/activity", put(update_activity))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// CORS policy for the configured front-end origin
pub fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origin {
        Some(origin) => {
            let origin = origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin {}: {}", origin, e))?;
            Ok(layer.allow_origin(origin).allow_credentials(true))
        }
        None => Ok(layer.allow_origin(AnyOrigin)),
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    ApiError::Internal.into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
    })
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}

/// Decode a body the auth service validates itself. Undecodable bodies are
/// treated as empty so they still count against the rate limit and report
/// the missing-field message.
fn auth_payload<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Unreadable auth payload: {}", rejection.body_text());
            T::default()
        }
    }
}

fn document_payload<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// Create an account
pub async fn signup(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = auth_payload(payload);
    let response = state.auth_service.signup(&client, &request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = auth_payload(payload);
    let response = state.auth_service.login(&client, &request).await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Read the caller's account and documents
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UserView>> {
    let account = state
        .accounts
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| {
            error!("Valid token for missing account {}", user.id);
            ApiError::NotFound(USER_NOT_FOUND.to_string())
        })?;

    let user_state = state.user_states.read(user.id).await?;

    Ok(Json(UserView::new(&account, user_state)))
}

/// Replace the caller's profile document
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let profile = document_payload(payload)?
        .profile
        .ok_or_else(|| ApiError::Validation("Profile data is required".to_string()))?;

    state.user_states.write_profile(user.id, &profile).await?;
    info!("Profile updated for {}", user.id);

    Ok(Json(SuccessResponse { success: true }))
}

/// Replace the caller's stats document
pub async fn update_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<StatsUpdate>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let stats = document_payload(payload)?
        .stats
        .ok_or_else(|| ApiError::Validation("Stats data is required".to_string()))?;

    state.user_states.write_stats(user.id, &stats).await?;
    info!("Stats updated for {}", user.id);

    Ok(Json(SuccessResponse { success: true }))
}

/// Replace the caller's progress document
pub async fn update_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ProgressUpdate>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let progress = document_payload(payload)?
        .progress
        .ok_or_else(|| ApiError::Validation("Progress data is required".to_string()))?;

    state.user_states.write_progress(user.id, &progress).await?;
    info!("Progress updated for {}", user.id);

    Ok(Json(SuccessResponse { success: true }))
}

/// Replace the caller's activity history
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ActivityUpdate>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let history = document_payload(payload)?
        .activity_history
        .ok_or_else(|| ApiError::Validation("Activity history is required".to_string()))?;

    state
        .user_states
        .write_activity_history(user.id, &history)
        .await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use common::models::ErrorBody;

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panicking_handler_renders_internal_error() {
        let router = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = router
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_invalid_cors_origin_is_rejected() {
        assert!(cors_layer(Some("not a\norigin")).is_err());
    }
}
