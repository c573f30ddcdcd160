//! Database error types.

use thiserror::Error;

/// Errors surfaced by the connection adapter and migrations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open or connect to the backend.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// A statement failed to execute.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A migration step failed; `version` identifies which one.
    #[error("migration {version} failed: {source}")]
    Migration {
        /// The migration version that failed.
        version: i64,
        /// The underlying error.
        #[source]
        source: sqlx::Error,
    },

    /// A row was expected but the query returned none.
    #[error("expected a row, found none")]
    NotFound,
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
