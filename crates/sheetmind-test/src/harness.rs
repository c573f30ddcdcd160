//! Shared setup for tests that need a migrated, scoped database.

use std::sync::Once;

use sheetmind_db::{migrate, Database};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber for the current test process, once.
/// Safe to call from every test — later calls are no-ops.
pub fn init_test_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init();
    });
}

/// Build an in-memory SQLite database with every migration applied.
///
/// # Panics
///
/// Panics if the connection or migration fails — test setup, not
/// production code, so a panic is the right failure mode.
pub async fn test_database() -> Database {
    let db = Database::connect_sqlite_memory().await.expect("connect in-memory sqlite");
    migrate(&db).await.expect("run migrations");
    db
}

/// A temporary directory seeded with a handful of spreadsheet-looking
/// files, for workspace-manifest tests.
///
/// # Panics
///
/// Panics if the directory or files can't be created.
#[must_use]
pub fn temp_workspace_with_files(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp workspace dir");
    for name in names {
        std::fs::write(dir.path().join(name), b"stub").expect("write fixture file");
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_is_migrated() {
        let db = test_database().await;
        // A migrated database can answer a trivial query against a
        // table the migrations are expected to create.
        let rows = db.query("SELECT COUNT(*) as n FROM sessions", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
