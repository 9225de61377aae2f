//! Video repository for database operations

use chrono::Utc;
use common::database::{from_timestamp, to_timestamp};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::json_object;
use crate::models::{NewVideo, Video};

/// Video repository for database operations
#[derive(Clone)]
pub struct VideoRepository {
    pool: SqlitePool,
}

impl VideoRepository {
    /// Create a new video repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a video by its external id
    pub async fn get(&self, video_id: &str) -> DatabaseResult<Option<Video>> {
        let row = sqlx::query(
            r#"
            SELECT video_id, platform, title, lang, metadata, created_at, updated_at
            FROM videos
            WHERE video_id = ?
            "#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(map_video).transpose()
    }

    /// Insert a new video
    ///
    /// Fails with `UniqueViolation` when the id is already registered.
    pub async fn create(&self, payload: &NewVideo) -> DatabaseResult<Video> {
        let now = to_timestamp(Utc::now());
        let metadata = serde_json::to_string(&payload.metadata).map_err(DatabaseError::decode)?;

        sqlx::query(
            r#"
            INSERT INTO videos (video_id, platform, title, lang, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.video_id)
        .bind(&payload.platform)
        .bind(&payload.title)
        .bind(&payload.lang)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(Video {
            video_id: payload.video_id.clone(),
            platform: payload.platform.clone(),
            title: payload.title.clone(),
            lang: payload.lang.clone(),
            metadata: payload.metadata.clone(),
            created_at: from_timestamp(now)?,
            updated_at: from_timestamp(now)?,
        })
    }

    /// Overwrite the descriptive fields of a video, keeping its creation time
    pub async fn update(&self, payload: &NewVideo) -> DatabaseResult<Option<Video>> {
        let metadata = serde_json::to_string(&payload.metadata).map_err(DatabaseError::decode)?;

        let result = sqlx::query(
            r#"
            UPDATE videos
            SET platform = ?, title = ?, lang = ?, metadata = ?, updated_at = ?
            WHERE video_id = ?
            "#,
        )
        .bind(&payload.platform)
        .bind(&payload.title)
        .bind(&payload.lang)
        .bind(&metadata)
        .bind(to_timestamp(Utc::now()))
        .bind(&payload.video_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(&payload.video_id).await
    }

    /// Create the video or update it if it exists
    ///
    /// Returns the stored video and whether it was created.
    pub async fn upsert(&self, payload: &NewVideo) -> DatabaseResult<(Video, bool)> {
        match self.update(payload).await? {
            Some(video) => Ok((video, false)),
            None => Ok((self.create(payload).await?, true)),
        }
    }
}

fn map_video(row: &SqliteRow) -> DatabaseResult<Video> {
    let metadata: String = row.get("metadata");

    Ok(Video {
        video_id: row.get("video_id"),
        platform: row.get("platform"),
        title: row.get("title"),
        lang: row.get("lang"),
        metadata: json_object(&metadata)?,
        created_at: from_timestamp(row.get("created_at"))?,
        updated_at: from_timestamp(row.get("updated_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::init_memory_pool;
    use serde_json::{Map, json};

    fn new_video(video_id: &str, title: &str) -> NewVideo {
        let mut metadata = Map::new();
        metadata.insert("season".to_string(), json!(1));
        NewVideo {
            video_id: video_id.to_string(),
            platform: "netflix".to_string(),
            title: title.to_string(),
            lang: "en".to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = VideoRepository::new(init_memory_pool().await.unwrap());
        repo.create(&new_video("v1", "Show A")).await.unwrap();

        let video = repo.get("v1").await.unwrap().unwrap();
        assert_eq!(video.title, "Show A");
        assert_eq!(video.metadata["season"], 1);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_unique_violation() {
        let repo = VideoRepository::new(init_memory_pool().await.unwrap());
        repo.create(&new_video("v1", "Show A")).await.unwrap();

        let result = repo.create(&new_video("v1", "Show B")).await;
        assert!(matches!(result, Err(DatabaseError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_upsert_reports_creation_and_keeps_created_at() {
        let repo = VideoRepository::new(init_memory_pool().await.unwrap());

        let (first, created) = repo.upsert(&new_video("v1", "Show A")).await.unwrap();
        assert!(created);

        let (second, created) = repo.upsert(&new_video("v1", "Show B")).await.unwrap();
        assert!(!created);
        assert_eq!(second.title, "Show B");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }
}
