//! Scope construction errors.

use thiserror::Error;

/// Errors raised while building a [`crate::UserContext`] or
/// [`crate::UserScope`].
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The claimed workspace root does not exist or is not a directory.
    #[error("workspace root does not exist: {0}")]
    WorkspaceRootMissing(String),

    /// Opening the user's scoped database connection failed.
    #[error("failed to open scoped connection: {0}")]
    Connection(#[from] sheetmind_db::DbError),
}

/// Result type for scope construction.
pub type ScopeResult<T> = Result<T, ScopeError>;
