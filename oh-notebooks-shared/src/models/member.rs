/// Open Humans member model and database operations
///
/// A member row holds the OAuth2 credential the service uses to act on behalf
/// of one Open Humans project member, plus the local username that identifies
/// them inside this service.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE members (
///     oh_id VARCHAR(16) PRIMARY KEY,
///     username VARCHAR(150) NOT NULL UNIQUE,
///     oh_username VARCHAR(256) NOT NULL DEFAULT 'user',
///     access_token VARCHAR(256) NOT NULL,
///     refresh_token VARCHAR(256) NOT NULL,
///     token_expires TIMESTAMPTZ NOT NULL,
///     public BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Members are never deleted by the service.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Tokens closer than this to expiry are refreshed before use
pub const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Open Humans member with stored OAuth2 credential
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    /// Open Humans project member id
    pub oh_id: String,

    /// Local username, unique within this service
    pub username: String,

    /// Display name on Open Humans
    pub oh_username: String,

    /// Current OAuth2 access token
    #[serde(skip_serializing, default)]
    pub access_token: String,

    /// OAuth2 refresh token
    #[serde(skip_serializing, default)]
    pub refresh_token: String,

    /// Absolute expiry of `access_token`
    pub token_expires: DateTime<Utc>,

    /// Whether the member chose to be listed publicly
    pub public: bool,

    /// When the member first authorized the service
    pub created_at: DateTime<Utc>,
}

/// Input for creating a member
#[derive(Debug, Clone)]
pub struct CreateMember {
    pub oh_id: String,
    pub username: String,
    pub oh_username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires: DateTime<Utc>,
}

const MEMBER_COLUMNS: &str = "oh_id, username, oh_username, access_token, refresh_token, \
                              token_expires, public, created_at";

impl Member {
    /// Absolute expiry for a token issued at `now` with lifetime `expires_in` seconds
    ///
    /// None when the lifetime does not fit in a timestamp.
    pub fn expiration(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
        now.checked_add_signed(Duration::try_seconds(expires_in)?)
    }

    /// Whether the access token must be refreshed before use at `now`
    ///
    /// The boundary is inclusive: a token expiring exactly 60 seconds from
    /// now is already considered stale.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.token_expires - Duration::seconds(REFRESH_MARGIN_SECONDS) <= now
    }

    /// Inserts a new member
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if `oh_id` or `username` already exist.
    pub async fn create(pool: &PgPool, data: CreateMember) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO members (oh_id, username, oh_username, access_token, refresh_token, token_expires)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(data.oh_id)
            .bind(data.username)
            .bind(data.oh_username)
            .bind(data.access_token)
            .bind(data.refresh_token)
            .bind(data.token_expires)
            .fetch_one(pool)
            .await
    }

    /// Looks a member up by Open Humans id
    pub async fn find_by_oh_id(pool: &PgPool, oh_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE oh_id = $1");

        sqlx::query_as::<_, Member>(&query)
            .bind(oh_id)
            .fetch_optional(pool)
            .await
    }

    /// Whether a local username is already taken
    pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE username = $1)")
            .bind(username)
            .fetch_one(pool)
            .await
    }

    /// Replaces the stored token pair and expiry
    ///
    /// Returns the updated member, or None if `oh_id` is unknown.
    pub async fn update_tokens(
        pool: &PgPool,
        oh_id: &str,
        access_token: &str,
        refresh_token: &str,
        token_expires: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE members
             SET access_token = $2, refresh_token = $3, token_expires = $4
             WHERE oh_id = $1
             RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(oh_id)
            .bind(access_token)
            .bind(refresh_token)
            .bind(token_expires)
            .fetch_optional(pool)
            .await
    }

    /// Sets the visibility flag
    pub async fn set_public(
        pool: &PgPool,
        oh_id: &str,
        public: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE members SET public = $2 WHERE oh_id = $1 RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(oh_id)
            .bind(public)
            .fetch_optional(pool)
            .await
    }
}
