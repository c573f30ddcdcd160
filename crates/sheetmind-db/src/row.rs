//! Row access with both positional and column-name lookup.

use sqlx::any::AnyRow;
use sqlx::{Column, Row as _};

use crate::error::{DbError, DbResult};

/// A single result row.
///
/// Wraps `sqlx`'s `AnyRow` so callers can fetch a column either by its
/// index or its name — the same row works whether calling code was
/// written against the SQLite shape or the Postgres shape.
pub struct Row(pub(crate) AnyRow);

impl Row {
    /// Fetch a column by its 0-based index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the stored value
    /// cannot be decoded as `T`.
    pub fn get<'r, T>(&'r self, idx: usize) -> DbResult<T>
    where
        T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
    {
        self.0.try_get(idx).map_err(DbError::from)
    }

    /// Fetch a column by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no column with that name exists or the stored
    /// value cannot be decoded as `T`.
    pub fn get_named<'r, T>(&'r self, name: &str) -> DbResult<T>
    where
        T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
    {
        self.0.try_get(name).map_err(DbError::from)
    }

    /// Column names, in positional order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.0.columns().iter().map(|c| c.name().to_string()).collect()
    }
}
