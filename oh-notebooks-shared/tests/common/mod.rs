//! Shared helpers for database integration tests
//!
//! Tests connect to `DATABASE_URL` and are skipped when it is not set.
//! Every helper creates rows with fresh ids so tests can run in parallel
//! against the same database.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use oh_notebooks_shared::db::migrations::run_migrations;
use oh_notebooks_shared::db::pool::{create_pool, DatabaseConfig};
use oh_notebooks_shared::models::member::{CreateMember, Member};
use sqlx::PgPool;
use uuid::Uuid;

/// Migrated pool, or None when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = create_pool(DatabaseConfig {
        url,
        max_connections: 5,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool");

    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

/// Short random token for unique ids and names
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Creates a member with a fresh Open Humans id
pub async fn create_member(pool: &PgPool, oh_username: &str, token_expires: DateTime<Utc>) -> Member {
    let oh_id = unique();

    Member::create(
        pool,
        CreateMember {
            username: format!("{oh_id}_openhumans"),
            oh_id,
            oh_username: oh_username.to_string(),
            access_token: "stored-access".to_string(),
            refresh_token: "stored-refresh".to_string(),
            token_expires,
        },
    )
    .await
    .expect("Failed to create member")
}

/// Expiry far enough ahead that no refresh happens
pub fn fresh_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::hours(10)
}
