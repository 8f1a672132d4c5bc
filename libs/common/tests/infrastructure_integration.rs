//! Integration tests for the infrastructure components
//!
//! These run against a real PostgreSQL database and Redis cache, configured
//! through `DATABASE_URL` and `REDIS_URL`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    error::DatabaseError,
    models::{ACTIVITY_HISTORY_LIMIT, ActivityEntry, NewAccount, default_stats},
    repositories::{AccountRepository, PgStore, UserStateRepository},
};
use serde_json::json;
use uuid::Uuid;

/// Accounts and documents survive a round trip through PostgreSQL
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_postgres_store() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");
    run_migrations(&pool).await?;

    let store = PgStore::new(pool);
    let email = format!("it-{}@example.com", Uuid::new_v4());
    let account = store
        .create(&NewAccount {
            email: email.clone(),
            name: "Integration".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await?;

    let duplicate = store
        .create(&NewAccount {
            email: email.clone(),
            name: "Again".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(DatabaseError::Conflict(_))));

    let found = store.find_by_email(&email).await?.expect("account by email");
    assert_eq!(found.id, account.id);

    let state = store.read(account.id).await?;
    assert_eq!(state.stats, default_stats());
    assert!(state.activity_history.is_empty());

    let stats = json!({ "totalQuestions": 4, "correctAnswers": 3, "streak": 1 });
    store.write_stats(account.id, &stats).await?;

    let history: Vec<ActivityEntry> = (0..ACTIVITY_HISTORY_LIMIT + 3)
        .map(|i| ActivityEntry {
            timestamp: chrono::Utc::now(),
            description: format!("entry {}", i),
            duration_minutes: 5,
            category: "quiz".to_string(),
        })
        .collect();
    store.write_activity_history(account.id, &history).await?;

    let state = store.read(account.id).await?;
    assert_eq!(state.stats, stats);
    assert_eq!(state.activity_history.len(), ACTIVITY_HISTORY_LIMIT);
    assert_eq!(state.activity_history[0].description, "entry 0");

    let raw = r#"{"zeta":1,"alpha":{"y":true,"b":[3,1]}}"#;
    let profile: serde_json::Value = serde_json::from_str(raw)?;
    store.write_profile(account.id, &profile).await?;
    let state = store.read(account.id).await?;
    assert_eq!(serde_json::to_string(&state.profile)?, raw);

    let missing = store.write_profile(Uuid::new_v4(), &json!({})).await;
    assert!(matches!(missing, Err(DatabaseError::NotFound(_))));

    Ok(())
}

/// The shared sliding window admits `limit` attempts and no more
#[tokio::test]
#[ignore = "requires a running Redis instance"]
async fn test_redis_sliding_window() -> Result<(), Box<dyn std::error::Error>> {
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    assert!(redis_pool.health_check().await?, "Redis health check failed");

    let key = format!("it:window:{}", Uuid::new_v4());
    let now = 1_700_000_000_000_i64;
    let window = 60_000;

    for i in 0..3 {
        assert!(redis_pool.admit_in_window(&key, now + i, window, 3).await?);
    }
    assert!(!redis_pool.admit_in_window(&key, now + 3, window, 3).await?);
    assert!(redis_pool.admit_in_window(&key, now + window + 1, window, 3).await?);

    redis_pool.delete(&key).await?;
    Ok(())
}
