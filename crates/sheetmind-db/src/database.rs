//! The connection adapter.

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::Row as _;

use crate::dialect::{self, Dialect};
use crate::error::{DbError, DbResult};
use crate::params::{to_any_arguments, Param};
use crate::row::Row;

/// A connection to either a SQLite file or a Postgres database, exposing
/// one uniform API regardless of backend.
///
/// SQL is always written once, in SQLite dialect; [`Database::execute`]
/// and friends rewrite it for Postgres via [`dialect::rewrite`] before
/// sending it down the wire.
///
/// Cheap to clone: the pool is reference-counted internally, so an owned
/// `Database` can be handed to long-lived, `'static` consumers (e.g. the
/// memory backend bound into a per-request task-local) without borrowing.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Open (creating if absent) a SQLite database file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connect`] if the file cannot be opened.
    pub async fn connect_sqlite(path: &str) -> DbResult<Self> {
        sqlx::any::install_default_drivers();
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self {
            pool,
            dialect: Dialect::Sqlite,
        })
    }

    /// Open an in-memory SQLite database (tests, anonymous sessions).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connect`] if the connection cannot be
    /// established.
    pub async fn connect_sqlite_memory() -> DbResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self {
            pool,
            dialect: Dialect::Sqlite,
        })
    }

    /// Connect to Postgres.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connect`] if the connection cannot be
    /// established.
    pub async fn connect_postgres(url: &str, max_connections: u32) -> DbResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self {
            pool,
            dialect: Dialect::Postgres,
        })
    }

    /// Which backend this adapter is talking to.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn rewrite(&self, sql: &str) -> String {
        dialect::rewrite(sql, self.dialect)
    }

    /// Execute a statement with no result rows (INSERT/UPDATE/DELETE/DDL).
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the statement fails.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> DbResult<u64> {
        let rewritten = self.rewrite(sql);
        let args = to_any_arguments(params)?;
        let result = sqlx::query_with(&rewritten, args).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Execute a `;`-separated script as a single transaction. Used only
    /// by migrations: each statement must be idempotent on its own
    /// (`IF NOT EXISTS`), but the whole script either fully applies or
    /// leaves no trace.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if any statement fails; the transaction
    /// is rolled back and no statement's effects survive.
    pub async fn execute_script(&self, sql: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for stmt in split_statements(sql) {
            let rewritten = self.rewrite(stmt);
            sqlx::query(&rewritten).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Execute the same statement once per entry in `batches`, inside a
    /// single transaction. Aborts and rolls back on the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if any batch fails; no partial writes
    /// survive.
    pub async fn execute_many(&self, sql: &str, batches: &[Vec<Param>]) -> DbResult<()> {
        let rewritten = self.rewrite(sql);
        let mut tx = self.pool.begin().await?;
        for params in batches {
            let args = to_any_arguments(params)?;
            sqlx::query_with(&rewritten, args).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Run zero or more statements and return all result rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the statement fails.
    pub async fn query(&self, sql: &str, params: &[Param]) -> DbResult<Vec<Row>> {
        let rewritten = self.rewrite(sql);
        let args = to_any_arguments(params)?;
        let rows: Vec<AnyRow> = sqlx::query_with(&rewritten, args).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Row).collect())
    }

    /// Run a statement expected to return exactly one row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no row matched, or
    /// [`DbError::Query`] if the statement fails.
    pub async fn query_one(&self, sql: &str, params: &[Param]) -> DbResult<Row> {
        self.query_optional(sql, params).await?.ok_or(DbError::NotFound)
    }

    /// Run a statement expected to return at most one row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the statement fails.
    pub async fn query_optional(&self, sql: &str, params: &[Param]) -> DbResult<Option<Row>> {
        let rewritten = self.rewrite(sql);
        let args = to_any_arguments(params)?;
        let row = sqlx::query_with(&rewritten, args).fetch_optional(&self.pool).await?;
        Ok(row.map(Row))
    }

    /// Check whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the metadata lookup fails.
    pub async fn table_exists(&self, name: &str) -> DbResult<bool> {
        match self.dialect {
            Dialect::Sqlite => {
                let row = self
                    .query_optional(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                        &[Param::text(name)],
                    )
                    .await?;
                Ok(row.is_some())
            },
            Dialect::Postgres => {
                let row = self
                    .query_optional(
                        "SELECT table_name FROM information_schema.tables WHERE table_name = ?",
                        &[Param::text(name)],
                    )
                    .await?;
                Ok(row.is_some())
            },
        }
    }

    /// Flush any buffered writes. `sqlx` autocommits outside an explicit
    /// transaction, so this is a no-op kept for parity with the
    /// reference adapter's `commit()` call sites and for SQLite `PRAGMA
    /// wal_checkpoint` hygiene.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the checkpoint fails.
    pub async fn commit(&self) -> DbResult<()> {
        if self.dialect == Dialect::Sqlite {
            sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Split a migration script into individual statements on top-level `;`
/// boundaries (no awareness of string-literal semicolons — migrations
/// don't need them).
fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_and_query_round_trip() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        db.execute("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)", &[])
            .await
            .unwrap();
        db.execute("INSERT INTO t (id, n) VALUES (?, ?)", &[Param::text("a"), Param::Int(1)])
            .await
            .unwrap();
        let rows = db.query("SELECT id, n FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let id: String = rows[0].get_named("id").unwrap();
        let n: i64 = rows[0].get(1).unwrap();
        assert_eq!(id, "a");
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn table_exists_reflects_schema() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        assert!(!db.table_exists("widgets").await.unwrap());
        db.execute("CREATE TABLE widgets (id TEXT PRIMARY KEY)", &[])
            .await
            .unwrap();
        assert!(db.table_exists("widgets").await.unwrap());
    }

    #[tokio::test]
    async fn query_one_errors_when_absent() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        db.execute("CREATE TABLE t (id TEXT PRIMARY KEY)", &[]).await.unwrap();
        let err = db.query_one("SELECT id FROM t WHERE id = ?", &[Param::text("missing")]).await;
        assert!(matches!(err, Err(DbError::NotFound)));
    }
}
