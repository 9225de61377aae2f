//! Explanation request audit log

use chrono::Utc;
use common::database::{from_timestamp, to_timestamp};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool};

use crate::models::{LanguageCount, NewRequestRecord, RequestRecord, RequestStatistics};

/// Append-only repository of explanation requests
#[derive(Clone)]
pub struct RequestRepository {
    pool: SqlitePool,
}

impl RequestRepository {
    /// Create a new request repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an audit record, returning its id
    pub async fn create(&self, payload: &NewRequestRecord) -> DatabaseResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO requests (video_id, image_id, session_id, lang, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.video_id)
        .bind(&payload.image_id)
        .bind(&payload.session_id)
        .bind(&payload.lang)
        .bind(to_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.last_insert_rowid())
    }

    /// Audit records of a video, oldest first
    pub async fn list_by_video(&self, video_id: &str) -> DatabaseResult<Vec<RequestRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, video_id, image_id, session_id, lang, created_at
            FROM requests
            WHERE video_id = ?
            ORDER BY request_id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.into_iter()
            .map(|row| {
                Ok(RequestRecord {
                    request_id: row.get("request_id"),
                    video_id: row.get("video_id"),
                    image_id: row.get("image_id"),
                    session_id: row.get("session_id"),
                    lang: row.get("lang"),
                    created_at: from_timestamp(row.get("created_at"))?,
                })
            })
            .collect()
    }

    /// Aggregate counts over all audit records
    pub async fn statistics(&self) -> DatabaseResult<RequestStatistics> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(image_id) AS with_image
            FROM requests
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        let total_requests: i64 = totals.get("total");
        let with_image: i64 = totals.get("with_image");

        let by_language = sqlx::query(
            r#"
            SELECT lang, COUNT(*) AS count
            FROM requests
            GROUP BY lang
            ORDER BY count DESC, lang
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?
        .into_iter()
        .map(|row| LanguageCount {
            lang: row.get("lang"),
            count: row.get("count"),
        })
        .collect();

        Ok(RequestStatistics {
            total_requests,
            by_language,
            with_image,
            without_image: total_requests - with_image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::init_memory_pool;

    fn record(lang: &str, image_id: Option<&str>) -> NewRequestRecord {
        NewRequestRecord {
            video_id: "v1".to_string(),
            image_id: image_id.map(str::to_string),
            session_id: "s1".to_string(),
            lang: lang.to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_do_not_need_a_video() {
        let repo = RequestRepository::new(init_memory_pool().await.unwrap());
        let id = repo.create(&record("en", Some("i1"))).await.unwrap();

        let records = repo.list_by_video("v1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_id, id);
        assert_eq!(records[0].image_id.as_deref(), Some("i1"));
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = RequestRepository::new(init_memory_pool().await.unwrap());
        for (lang, image) in [("ko", None), ("en", Some("i1")), ("ko", Some("i2"))] {
            repo.create(&record(lang, image)).await.unwrap();
        }

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.with_image, 2);
        assert_eq!(stats.without_image, 1);
        assert_eq!(
            stats.by_language,
            vec![
                LanguageCount { lang: "ko".to_string(), count: 2 },
                LanguageCount { lang: "en".to_string(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_statistics_when_empty() {
        let repo = RequestRepository::new(init_memory_pool().await.unwrap());
        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total_requests, 0);
        assert!(stats.by_language.is_empty());
    }
}
