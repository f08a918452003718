//! Database error types

use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Conditional write matched no rows: {0}")]
    StaleWrite(String),
}

impl DbError {
    /// Check whether a query error is a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Duplicate(_) => true,
            Self::Query(sqlx::Error::Database(db)) => {
                db.kind() == sqlx::error::ErrorKind::UniqueViolation
            }
            _ => false,
        }
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
