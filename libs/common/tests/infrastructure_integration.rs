//! Integration tests for the infrastructure components
//!
//! These tests verify that a file-backed SQLite database can be created,
//! migrated and queried from the application.

use common::{
    database::{DatabaseConfig, from_timestamp, health_check, init_pool, run_migrations, to_timestamp},
    error::DatabaseError,
};
use sqlx::Row;

/// Test that verifies a fresh database file is created and migrated
#[tokio::test]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("docent-it-{}", std::process::id()));
    let db_config = DatabaseConfig {
        url: format!("sqlite://{}/nested/docent.db", dir.display()),
        max_connections: 2,
        connection_timeout: 5,
    };

    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "SQLite simple query test failed");

    let now = chrono::Utc::now();
    sqlx::query(
        r#"
        INSERT INTO settings (id, setting_value, metadata, created_at, updated_at)
        VALUES (?, ?, '{}', ?, ?)
        "#,
    )
    .bind("integration_key")
    .bind("integration_value")
    .bind(to_timestamp(now))
    .bind(to_timestamp(now))
    .execute(&pool)
    .await?;

    let row = sqlx::query("SELECT setting_value, created_at FROM settings WHERE id = ?")
        .bind("integration_key")
        .fetch_one(&pool)
        .await?;
    let value: String = row.get("setting_value");
    let created_at = from_timestamp(row.get("created_at"))?;
    assert_eq!(value, "integration_value");
    assert_eq!(created_at.timestamp_micros(), now.timestamp_micros());

    // Duplicate primary keys surface as unique violations
    let duplicate = sqlx::query(
        "INSERT INTO settings (id, setting_value, created_at, updated_at) VALUES (?, 'x', 0, 0)",
    )
    .bind("integration_key")
    .execute(&pool)
    .await
    .map_err(DatabaseError::from_query);
    assert!(matches!(duplicate, Err(DatabaseError::UniqueViolation(_))));

    pool.close().await;
    std::fs::remove_dir_all(&dir)?;

    Ok(())
}
