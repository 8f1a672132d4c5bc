use std::net::SocketAddr;

use anyhow::Result;
use api::{
    AppState,
    config::{RateLimitBackend, Settings, StorageBackend},
    cors_layer, create_router,
};
use auth::{
    JwtConfig, JwtService, RateLimiter, RateLimiterConfig,
    password::{HashingConfig, PasswordService},
};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    repositories::{MemoryStore, PgStore},
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting API service");

    let settings = Settings::from_env()?;

    let jwt_service = JwtService::new(JwtConfig {
        secret: settings.jwt_secret().to_string(),
        token_expiry: settings.jwt_expiry_seconds,
    })?;

    let limiter_config = RateLimiterConfig {
        max_attempts: settings.rate_limit_max_attempts,
        window_seconds: settings.rate_limit_window_seconds,
    };
    let rate_limiter = match settings.rate_limit_backend {
        RateLimitBackend::Memory => RateLimiter::new(limiter_config),
        RateLimitBackend::Redis => {
            let redis_pool = RedisPool::new(&RedisConfig {
                url: settings.redis_url.clone().unwrap_or_default(),
            })
            .await?;
            if !redis_pool.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            info!("Rate limit windows shared through Redis");
            RateLimiter::with_redis(limiter_config, redis_pool)
        }
    };

    let passwords = PasswordService::new(&HashingConfig::default())?;

    let app_state = match settings.storage_backend {
        StorageBackend::Postgres => {
            let db_config =
                DatabaseConfig::new(settings.database_url.clone().unwrap_or_default())
                    .with_max_connections(settings.database_max_connections);
            let pool = init_pool(&db_config).await?;

            // Check database connectivity
            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            AppState::new(PgStore::new(pool), jwt_service, passwords, rate_limiter)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all accounts are lost on shutdown");
            AppState::new(MemoryStore::new(), jwt_service, passwords, rate_limiter)
        }
    }
    .with_trust_proxy(settings.trust_proxy);

    if settings.cors_origin.is_none() {
        warn!("CORS_ORIGIN not set; allowing any origin without credentials");
    }

    // Start the web server
    let app = create_router(app_state).layer(cors_layer(settings.cors_origin.as_deref())?);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
