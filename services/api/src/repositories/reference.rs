//! Video reference repository for database operations

use chrono::Utc;
use common::database::{from_timestamp, to_timestamp};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt::Write;

use crate::models::{Reference, ReferenceDocument, ReferenceMetadata};

/// Video reference repository for database operations
#[derive(Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    /// Create a new reference repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a reference document, returning its row id
    pub async fn create(
        &self,
        video_id: &str,
        document: &ReferenceDocument,
        metadata: &ReferenceMetadata,
    ) -> DatabaseResult<i64> {
        let blob = serde_json::to_vec(document).map_err(DatabaseError::decode)?;
        let metadata = serde_json::to_string(metadata).map_err(DatabaseError::decode)?;

        let result = sqlx::query(
            r#"
            INSERT INTO video_references (video_id, reference, metadata, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(video_id)
        .bind(blob)
        .bind(metadata)
        .bind(to_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.last_insert_rowid())
    }

    /// Number of references stored for a video
    pub async fn count_by_video(&self, video_id: &str) -> DatabaseResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM video_references WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_query)
    }

    /// All references of a video, oldest first
    pub async fn list_by_video(&self, video_id: &str) -> DatabaseResult<Vec<Reference>> {
        let rows = sqlx::query(
            r#"
            SELECT id, video_id, reference, metadata, created_at
            FROM video_references
            WHERE video_id = ?
            ORDER BY id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(map_reference).collect()
    }

    /// Render the stored items of a video as numbered prompt text
    ///
    /// Returns `None` when the video has no stored items.
    pub async fn get_reference_content(&self, video_id: &str) -> DatabaseResult<Option<String>> {
        let references = self.list_by_video(video_id).await?;

        let mut content = String::new();
        let items = references
            .iter()
            .flat_map(|reference| reference.document.items.iter());
        for (index, item) in items.enumerate() {
            if index > 0 {
                content.push('\n');
            }
            let _ = writeln!(content, "{}. {}", index + 1, item.title);
            let _ = writeln!(content, "   URL: {}", item.url);
            if !item.snippet.is_empty() {
                let _ = writeln!(content, "   {}", item.snippet);
            }
        }

        Ok((!content.is_empty()).then(|| content.trim_end().to_string()))
    }
}

fn map_reference(row: &SqliteRow) -> DatabaseResult<Reference> {
    let blob: Vec<u8> = row.get("reference");
    let metadata: String = row.get("metadata");

    Ok(Reference {
        id: row.get("id"),
        video_id: row.get("video_id"),
        document: serde_json::from_slice(&blob).map_err(DatabaseError::decode)?,
        metadata: serde_json::from_str(&metadata).map_err(DatabaseError::decode)?,
        created_at: from_timestamp(row.get("created_at"))?,
    })
}
