//! Database module for handling SQLite connections and schema
//!
//! This module provides connection pooling, configuration, migrations and
//! health checks for the SQLite database shared by the services.

use crate::error::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Schema statements, applied in order. Every statement is idempotent.
///
/// Timestamps are INTEGER microseconds since the Unix epoch (UTC).
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        token TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_profile
        ON sessions (json_extract(metadata, '$.profile_id'))
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        video_id TEXT PRIMARY KEY,
        platform TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        lang TEXT NOT NULL DEFAULT 'en',
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_references (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL REFERENCES videos (video_id) ON DELETE CASCADE,
        reference BLOB NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_video_references_video ON video_references (video_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        image_id TEXT PRIMARY KEY,
        video_id TEXT NOT NULL REFERENCES videos (video_id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS requests (
        request_id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL,
        image_id TEXT,
        session_id TEXT NOT NULL,
        lang TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        id TEXT PRIMARY KEY,
        setting_value TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

/// Database configuration struct
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

fn default_url() -> String {
    "sqlite://./data/docent.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: SQLite connection URL (default: `sqlite://./data/docent.db`)
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 5)
    /// - `DATABASE_CONNECTION_TIMEOUT`: Acquire timeout in seconds (default: 30)
    pub fn from_env() -> DatabaseResult<Self> {
        crate::config::from_env("DATABASE")
            .map_err(|e| DatabaseError::Configuration(e.to_string()))
    }
}

/// Initialize a SQLite connection pool
///
/// The database file and its parent directory are created when missing and
/// the connection runs in WAL mode so both services can share the file.
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    info!("Initializing database connection pool");

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Configuration(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Open a private in-memory database with the schema applied
///
/// The pool holds exactly one connection that never expires, since an
/// in-memory database lives only as long as its connection.
pub async fn init_memory_pool() -> DatabaseResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DatabaseError::Configuration(e.to_string()))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Create the tables and indexes used by the services
pub async fn run_migrations(pool: &SqlitePool) -> DatabaseResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    }

    info!("Database schema is up to date");
    Ok(())
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - SQLite connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if connection is successful
pub async fn health_check(pool: &SqlitePool) -> DatabaseResult<bool> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DatabaseError::Query)?;

    Ok(true)
}

/// Convert a timestamp to its stored representation
pub fn to_timestamp(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

/// Convert a stored timestamp back to UTC
pub fn from_timestamp(micros: i64) -> DatabaseResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| DatabaseError::Decode(format!("Timestamp out of range: {}", micros)))
}
