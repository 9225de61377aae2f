//! Settings repository for database operations

use chrono::Utc;
use common::database::{from_timestamp, to_timestamp};
use common::error::{DatabaseError, DatabaseResult};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::models::Setting;

/// Settings repository for database operations
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Create a new settings repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a setting by id
    pub async fn get(&self, id: &str) -> DatabaseResult<Option<Setting>> {
        let row = sqlx::query(
            r#"
            SELECT id, setting_value, metadata, created_at, updated_at
            FROM settings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        match row {
            Some(row) => {
                let metadata: String = row.get("metadata");
                Ok(Some(Setting {
                    id: row.get("id"),
                    setting_value: row.get("setting_value"),
                    metadata: serde_json::from_str(&metadata).map_err(DatabaseError::decode)?,
                    created_at: from_timestamp(row.get("created_at"))?,
                    updated_at: from_timestamp(row.get("updated_at"))?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Get only the value of a setting
    pub async fn get_value(&self, id: &str) -> DatabaseResult<Option<String>> {
        sqlx::query_scalar("SELECT setting_value FROM settings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)
    }

    /// Insert a setting only if the id is free
    ///
    /// Returns whether the setting was inserted.
    pub async fn create_if_absent(
        &self,
        id: &str,
        value: &str,
        metadata: &Value,
    ) -> DatabaseResult<bool> {
        let now = to_timestamp(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO settings (id, setting_value, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(value)
        .bind(metadata.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the value of an existing setting
    ///
    /// Returns false when no setting has this id.
    pub async fn update_value(&self, id: &str, value: &str) -> DatabaseResult<bool> {
        let result =
            sqlx::query("UPDATE settings SET setting_value = ?, updated_at = ? WHERE id = ?")
                .bind(value)
                .bind(to_timestamp(Utc::now()))
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}
