// src/db.rs
use crate::config::Config;
use crate::error::{AppError, failure_envelope};
use crate::models::{AdminStats, Subscription, User, UserCredentials, Video};
use bcrypt::{DEFAULT_COST, hash};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("Database connection failed: {source}")]
pub struct ConnectError {
    #[source]
    pub source: sqlx::Error,
    production: bool,
}

impl ConnectError {
    pub fn new(source: sqlx::Error, production: bool) -> Self {
        Self { source, production }
    }

    /// Body reported to the caller. Production hides the driver message.
    pub fn envelope(&self) -> serde_json::Value {
        if self.production {
            failure_envelope("Database connection failed. Please try again later.")
        } else {
            failure_envelope(&self.to_string())
        }
    }
}

pub fn connect_options(config: &Config) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.database_host)
        .port(config.database_port)
        .database(&config.database_name)
        .username(&config.database_user)
        .password(&config.database_password)
}

pub async fn connect(config: &Config) -> Result<PgPool, ConnectError> {
    tracing::info!("Connecting to {}", config.redacted_dsn());
    PgPool::connect_with(connect_options(config))
        .await
        .map_err(|e| ConnectError::new(e, config.is_production()))
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        stripe_customer_id TEXT NOT NULL,
        stripe_subscription_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'inactive',
        current_period_start TIMESTAMPTZ,
        current_period_end TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS subscriptions_stripe_subscription_id_idx
        ON subscriptions (stripe_subscription_id)",
    "CREATE TABLE IF NOT EXISTS videos (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        youtube_url TEXT NOT NULL,
        youtube_video_id TEXT NOT NULL UNIQUE,
        thumbnail_url TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Creates the configured admin account unless a user with that email exists.
/// The email is trimmed and lowercased the same way login does.
pub async fn ensure_admin(pool: &PgPool, email: &str, password: &str) -> Result<bool, AppError> {
    let email = email.trim().to_lowercase();
    if get_user_by_email(pool, &email).await?.is_some() {
        return Ok(false);
    }
    let password_hash = hash(password, DEFAULT_COST)?;
    insert_user(pool, &email, &password_hash, true).await?;
    tracing::info!("Created admin user: {}", email);
    Ok(true)
}

// Users

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, email, is_admin, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserCredentials>, sqlx::Error> {
    sqlx::query_as::<_, UserCredentials>(
        "SELECT id, email, password_hash, is_admin FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Hashes the password with bcrypt and stores a regular (non-admin) user.
pub async fn create_user(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AppError> {
    let password_hash = hash(password, DEFAULT_COST)?;
    Ok(insert_user(pool, email, &password_hash, false).await?)
}

async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    is_admin: bool,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO users (id, email, password_hash, is_admin) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(is_admin)
    .fetch_one(pool)
    .await
}

// Subscriptions

pub async fn has_active_subscription(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1 AND status = 'active' AND current_period_end > NOW()",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn get_subscription(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(
        "SELECT user_id, stripe_customer_id, stripe_subscription_id, status, current_period_start, current_period_end, updated_at FROM subscriptions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Inserts or overwrites the single subscription row of `user_id`.
pub async fn update_subscription(
    pool: &PgPool,
    user_id: Uuid,
    stripe_customer_id: &str,
    stripe_subscription_id: &str,
    status: &str,
    current_period_end: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    upsert_subscription(
        pool,
        user_id,
        stripe_customer_id,
        stripe_subscription_id,
        status,
        None,
        current_period_end,
    )
    .await
}

pub async fn upsert_subscription(
    pool: &PgPool,
    user_id: Uuid,
    stripe_customer_id: &str,
    stripe_subscription_id: &str,
    status: &str,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscriptions (user_id, stripe_customer_id, stripe_subscription_id, status, current_period_start, current_period_end)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (user_id) DO UPDATE SET
             stripe_customer_id = EXCLUDED.stripe_customer_id,
             stripe_subscription_id = EXCLUDED.stripe_subscription_id,
             status = EXCLUDED.status,
             current_period_start = COALESCE(EXCLUDED.current_period_start, subscriptions.current_period_start),
             current_period_end = EXCLUDED.current_period_end,
             updated_at = NOW()",
    )
    .bind(user_id)
    .bind(stripe_customer_id)
    .bind(stripe_subscription_id)
    .bind(status)
    .bind(current_period_start)
    .bind(current_period_end)
    .execute(pool)
    .await?;
    Ok(())
}

/// Updates the row holding `stripe_subscription_id`. Period columns are kept
/// when `None`. Returns whether a row matched.
pub async fn update_subscription_by_stripe_id(
    pool: &PgPool,
    stripe_subscription_id: &str,
    status: &str,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions SET
             status = $2,
             current_period_start = COALESCE($3, current_period_start),
             current_period_end = COALESCE($4, current_period_end),
             updated_at = NOW()
         WHERE stripe_subscription_id = $1",
    )
    .bind(stripe_subscription_id)
    .bind(status)
    .bind(current_period_start)
    .bind(current_period_end)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

// Videos

const VIDEO_COLUMNS: &str =
    "id, title, description, youtube_url, youtube_video_id, thumbnail_url, is_active, created_at";

pub async fn get_active_videos(pool: &PgPool) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE is_active = true ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_all_videos(pool: &PgPool) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn add_video(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    youtube_url: &str,
    youtube_video_id: &str,
    thumbnail_url: Option<&str>,
) -> Result<Video, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!(
        "INSERT INTO videos (id, title, description, youtube_url, youtube_video_id, thumbnail_url)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {VIDEO_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(description)
    .bind(youtube_url)
    .bind(youtube_video_id)
    .bind(thumbnail_url)
    .fetch_one(pool)
    .await
}

pub async fn video_exists(pool: &PgPool, youtube_video_id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM videos WHERE youtube_video_id = $1)")
        .bind(youtube_video_id)
        .fetch_one(pool)
        .await
}

/// `description` of `Some("")` clears the column. Returns whether a row matched.
pub async fn update_video(
    pool: &PgPool,
    video_id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    is_active: Option<bool>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE videos SET
             title = COALESCE($2, title),
             description = CASE WHEN $3::TEXT IS NULL THEN description ELSE NULLIF($3, '') END,
             is_active = COALESCE($4, is_active),
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(video_id)
    .bind(title)
    .bind(description)
    .bind(is_active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_video(pool: &PgPool, video_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn admin_stats(pool: &PgPool) -> Result<AdminStats, sqlx::Error> {
    sqlx::query_as::<_, AdminStats>(
        "SELECT
             (SELECT COUNT(*) FROM videos WHERE is_active = true) AS total_videos,
             (SELECT COUNT(*) FROM users) AS total_users,
             (SELECT COUNT(*) FROM subscriptions WHERE status = 'active' AND current_period_end > NOW()) AS active_subscribers,
             (SELECT COUNT(*) FROM videos WHERE is_active = true
                 AND created_at >= date_trunc('month', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC')
                 AS videos_this_month",
    )
    .fetch_one(pool)
    .await
}
