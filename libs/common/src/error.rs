//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A unique or primary key constraint rejected a write
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A stored value could not be converted to its domain type
    #[error("Database decode error: {0}")]
    Decode(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a failed query, separating unique constraint violations
    pub fn from_query(error: SqlxError) -> Self {
        match &error {
            SqlxError::Database(db_error) if db_error.is_unique_violation() => {
                DatabaseError::UniqueViolation(db_error.message().to_string())
            }
            _ => DatabaseError::Query(error),
        }
    }

    /// Wrap a JSON column (de)serialization failure
    pub fn decode(error: impl std::fmt::Display) -> Self {
        DatabaseError::Decode(error.to_string())
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
