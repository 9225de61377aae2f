//! Session repository for database operations
//!
//! At most one live session per profile is expected, but nothing in the
//! schema enforces it: callers look up before they create.

use chrono::{Duration, Utc};
use common::database::{from_timestamp, to_timestamp};
use common::error::DatabaseError;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::models::{NewSession, Session, SessionMetadata};

/// Session store errors
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// A session with the same id already exists
    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Type alias for session store results
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new session expiring `ttl_hours` from now
    pub async fn create(&self, payload: &NewSession) -> SessionStoreResult<Session> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(payload.ttl_hours);
        let metadata = serde_json::to_string(&payload.metadata).map_err(DatabaseError::decode)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, token, metadata, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.session_id)
        .bind(&payload.token)
        .bind(&metadata)
        .bind(to_timestamp(now))
        .bind(to_timestamp(expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from_query(e) {
            DatabaseError::UniqueViolation(_) => {
                SessionStoreError::DuplicateSession(payload.session_id.clone())
            }
            other => other.into(),
        })?;

        Ok(Session {
            session_id: payload.session_id.clone(),
            token: Some(payload.token.clone()),
            metadata: payload.metadata.clone(),
            created_at: from_timestamp(to_timestamp(now))?,
            expires_at: from_timestamp(to_timestamp(expires_at))?,
        })
    }

    /// Get a session by id, expired or not
    pub async fn get(&self, session_id: &str) -> SessionStoreResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, token, metadata, created_at, expires_at
            FROM sessions
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(map_session).transpose()
    }

    /// Get a session by id if it has not expired
    pub async fn get_valid(&self, session_id: &str) -> SessionStoreResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, token, metadata, created_at, expires_at
            FROM sessions
            WHERE session_id = ? AND expires_at > ?
            "#,
        )
        .bind(session_id)
        .bind(to_timestamp(Utc::now()))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(map_session).transpose()
    }

    /// Get the live session of a profile
    ///
    /// Expired rows are ignored but left in place for the sweep. If a race
    /// left more than one live session, the one expiring last wins.
    pub async fn get_valid_by_profile(
        &self,
        profile_id: &str,
    ) -> SessionStoreResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, token, metadata, created_at, expires_at
            FROM sessions
            WHERE json_extract(metadata, '$.profile_id') = ? AND expires_at > ?
            ORDER BY expires_at DESC
            LIMIT 1
            "#,
        )
        .bind(profile_id)
        .bind(to_timestamp(Utc::now()))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(map_session).transpose()
    }

    /// Replace the token of a session, leaving its expiry untouched
    pub async fn update_token(&self, session_id: &str, token: &str) -> SessionStoreResult<bool> {
        let result = sqlx::query("UPDATE sessions SET token = ? WHERE session_id = ?")
            .bind(token)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the metadata of a session
    pub async fn update_metadata(
        &self,
        session_id: &str,
        metadata: &SessionMetadata,
    ) -> SessionStoreResult<bool> {
        let metadata = serde_json::to_string(metadata).map_err(DatabaseError::decode)?;
        let result = sqlx::query("UPDATE sessions SET metadata = ? WHERE session_id = ?")
            .bind(metadata)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Push the expiry to `extra_hours` from now
    ///
    /// The stored expiry never moves backwards: if it is already later than
    /// the new value it is kept. Returns false when the session is unknown.
    pub async fn extend_expiration(
        &self,
        session_id: &str,
        extra_hours: i64,
    ) -> SessionStoreResult<bool> {
        let expires_at = Utc::now() + Duration::hours(extra_hours);
        let result =
            sqlx::query("UPDATE sessions SET expires_at = MAX(expires_at, ?) WHERE session_id = ?")
                .bind(to_timestamp(expires_at))
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a session by id
    pub async fn delete(&self, session_id: &str) -> SessionStoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session whose expiry has passed
    pub async fn delete_expired(&self) -> SessionStoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(to_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected())
    }

    /// Count sessions that have not expired
    pub async fn count_active(&self) -> SessionStoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE expires_at > ?")
            .bind(to_timestamp(Utc::now()))
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(count)
    }
}

fn map_session(row: &SqliteRow) -> SessionStoreResult<Session> {
    let metadata: String = row.get("metadata");
    let metadata: SessionMetadata =
        serde_json::from_str(&metadata).map_err(DatabaseError::decode)?;

    Ok(Session {
        session_id: row.get("session_id"),
        token: row.get("token"),
        metadata,
        created_at: from_timestamp(row.get("created_at"))?,
        expires_at: from_timestamp(row.get("expires_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::init_memory_pool;

    fn new_session(session_id: &str, profile_id: &str, ttl_hours: i64) -> NewSession {
        NewSession {
            session_id: session_id.to_string(),
            token: format!("token-{}", session_id),
            metadata: SessionMetadata {
                profile_id: profile_id.to_string(),
                client_ip: Some("203.0.113.7".to_string()),
            },
            ttl_hours,
        }
    }

    async fn repository() -> SessionRepository {
        SessionRepository::new(init_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_get_valid() {
        let repo = repository().await;
        let created = repo.create(&new_session("s1", "p1", 168)).await.unwrap();

        let fetched = repo.get_valid("s1").await.unwrap().unwrap();
        assert_eq!(fetched.session_id, "s1");
        assert_eq!(fetched.profile_id(), "p1");
        assert_eq!(fetched.token.as_deref(), Some("token-s1"));
        assert_eq!(fetched.expires_at, created.expires_at);
        assert_eq!(
            fetched.metadata.client_ip.as_deref(),
            Some("203.0.113.7")
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let repo = repository().await;
        repo.create(&new_session("s1", "p1", 168)).await.unwrap();

        let result = repo.create(&new_session("s1", "p2", 168)).await;
        assert!(matches!(result, Err(SessionStoreError::DuplicateSession(id)) if id == "s1"));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_not_valid() {
        let repo = repository().await;
        repo.create(&new_session("old", "p1", -1)).await.unwrap();

        assert!(repo.get_valid("old").await.unwrap().is_none());
        assert!(repo.get_valid_by_profile("p1").await.unwrap().is_none());
        // Lookups leave the row for the sweep
        assert!(repo.get("old").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_valid_by_profile_isolates_profiles() {
        let repo = repository().await;
        repo.create(&new_session("s1", "p1", 168)).await.unwrap();
        repo.create(&new_session("s2", "p2", 168)).await.unwrap();

        let first = repo.get_valid_by_profile("p1").await.unwrap().unwrap();
        let second = repo.get_valid_by_profile("p2").await.unwrap().unwrap();
        assert_eq!(first.session_id, "s1");
        assert_eq!(second.session_id, "s2");
        assert!(repo.get_valid_by_profile("p3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_token_keeps_expiry() {
        let repo = repository().await;
        let created = repo.create(&new_session("s1", "p1", 168)).await.unwrap();

        assert!(repo.update_token("s1", "fresh").await.unwrap());
        let fetched = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(fetched.token.as_deref(), Some("fresh"));
        assert_eq!(fetched.expires_at, created.expires_at);

        assert!(!repo.update_token("missing", "fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_extend_expiration_only_moves_forward() {
        let repo = repository().await;
        let created = repo.create(&new_session("s1", "p1", 168)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert!(repo.extend_expiration("s1", 168).await.unwrap());
        let extended = repo.get("s1").await.unwrap().unwrap();
        assert!(extended.expires_at > created.expires_at);
        assert_eq!(extended.token, created.token);

        // A shorter extension never pulls the expiry back
        assert!(repo.extend_expiration("s1", 1).await.unwrap());
        let unchanged = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(unchanged.expires_at, extended.expires_at);

        assert!(!repo.extend_expiration("missing", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_valid_sessions() {
        let repo = repository().await;
        repo.create(&new_session("live", "p1", 168)).await.unwrap();
        repo.create(&new_session("dead-1", "p2", -1)).await.unwrap();
        repo.create(&new_session("dead-2", "p3", -24)).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 2);
        assert!(repo.get("live").await.unwrap().is_some());
        assert!(repo.get("dead-1").await.unwrap().is_none());
        assert_eq!(repo.count_active().await.unwrap(), 1);

        assert_eq!(repo.delete_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_and_update_metadata() {
        let repo = repository().await;
        repo.create(&new_session("s1", "p1", 168)).await.unwrap();

        let metadata = SessionMetadata {
            profile_id: "p1".to_string(),
            client_ip: Some("198.51.100.2".to_string()),
        };
        assert!(repo.update_metadata("s1", &metadata).await.unwrap());
        assert_eq!(repo.get("s1").await.unwrap().unwrap().metadata, metadata);

        assert!(repo.delete("s1").await.unwrap());
        assert!(!repo.delete("s1").await.unwrap());
        assert!(repo.get_valid_by_profile("p1").await.unwrap().is_none());
    }
}
