//! Image repository for database operations

use chrono::Utc;
use common::database::{from_timestamp, to_timestamp};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool};

use crate::models::{Image, NewImage};

/// Image repository for database operations
#[derive(Clone)]
pub struct ImageRepository {
    pool: SqlitePool,
}

impl ImageRepository {
    /// Create a new image repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an uploaded image
    pub async fn create(&self, payload: &NewImage) -> DatabaseResult<Image> {
        let now = to_timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO images (image_id, video_id, file_path, original_filename, file_size, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.image_id)
        .bind(&payload.video_id)
        .bind(&payload.file_path)
        .bind(&payload.original_filename)
        .bind(payload.file_size)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(Image {
            image_id: payload.image_id.clone(),
            video_id: payload.video_id.clone(),
            file_path: payload.file_path.clone(),
            original_filename: payload.original_filename.clone(),
            file_size: payload.file_size,
            created_at: from_timestamp(now)?,
        })
    }

    /// Get an image by id
    pub async fn get(&self, image_id: &str) -> DatabaseResult<Option<Image>> {
        let row = sqlx::query(
            r#"
            SELECT image_id, video_id, file_path, original_filename, file_size, created_at
            FROM images
            WHERE image_id = ?
            "#,
        )
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        match row {
            Some(row) => Ok(Some(Image {
                image_id: row.get("image_id"),
                video_id: row.get("video_id"),
                file_path: row.get("file_path"),
                original_filename: row.get("original_filename"),
                file_size: row.get("file_size"),
                created_at: from_timestamp(row.get("created_at"))?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewVideo;
    use crate::repositories::VideoRepository;
    use common::database::init_memory_pool;
    use serde_json::Map;

    fn new_image(image_id: &str, video_id: &str) -> NewImage {
        NewImage {
            image_id: image_id.to_string(),
            video_id: video_id.to_string(),
            file_path: format!("/tmp/{}.png", image_id),
            original_filename: "frame.png".to_string(),
            file_size: 2048,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = init_memory_pool().await.unwrap();
        VideoRepository::new(pool.clone())
            .create(&NewVideo {
                video_id: "v1".to_string(),
                platform: "x".to_string(),
                title: "Show A".to_string(),
                lang: "en".to_string(),
                metadata: Map::new(),
            })
            .await
            .unwrap();

        let repo = ImageRepository::new(pool);
        repo.create(&new_image("i1", "v1")).await.unwrap();

        let image = repo.get("i1").await.unwrap().unwrap();
        assert_eq!(image.video_id, "v1");
        assert_eq!(image.file_size, 2048);
        assert!(repo.get("i2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_image_of_unknown_video_is_rejected() {
        let repo = ImageRepository::new(init_memory_pool().await.unwrap());
        assert!(repo.create(&new_image("i1", "missing")).await.is_err());
    }
}
