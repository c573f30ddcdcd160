//! Versioned, idempotent schema migrations.
//!
//! Migrations are an ordered sequence of integer versions. A
//! `schema_version` table records which versions have been applied; on
//! [`migrate`], every version not yet recorded is applied, in ascending
//! order, each inside its own transaction (see
//! [`Database::execute_script`](crate::Database::execute_script)) — a
//! failing migration leaves `schema_version` exactly as it was before the
//! call, never partially advanced.

use tracing::info;

use crate::database::Database;
use crate::error::DbResult;
use crate::params::Param;

/// One schema migration.
pub struct Migration {
    /// Monotonically increasing version number, starting at 1.
    pub version: i64,
    /// Human-readable description (used only in logs).
    pub description: &'static str,
    /// The SQL script to run. Every statement must be safe to apply to a
    /// database that may already be ahead of this version's *intent* but
    /// not its *record* (hence `IF NOT EXISTS` / `ADD COLUMN IF NOT
    /// EXISTS` everywhere).
    pub sql: &'static str,
}

/// The full, ordered migration set. `LATEST` is `MIGRATIONS.len()` as an
/// `i64`; tables referenced by `sheetmind-stores` are declared here.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "sessions, messages",
        sql: r"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                title_source TEXT NOT NULL DEFAULT 'unset',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active',
                user_id TEXT
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_call_id TEXT,
                turn_number INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages (session_id, id);
        ",
    },
    Migration {
        version: 2,
        description: "memory_entries",
        sql: r"
            CREATE TABLE IF NOT EXISTS memory_entries (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                user_id TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_memory_entries_dedup
                ON memory_entries (category, content_hash, user_id);
        ",
    },
    Migration {
        version: 3,
        description: "vector_records",
        sql: r"
            CREATE TABLE IF NOT EXISTS vector_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                vector BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                user_id TEXT
            );
        ",
    },
    Migration {
        version: 4,
        description: "tool_call_log, llm_call_log",
        sql: r"
            CREATE TABLE IF NOT EXISTS tool_call_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                turn INTEGER NOT NULL,
                iteration INTEGER NOT NULL,
                tool_name TEXT NOT NULL,
                success INTEGER NOT NULL,
                latency_ms INTEGER,
                created_at TEXT NOT NULL,
                user_id TEXT
            );
            CREATE TABLE IF NOT EXISTS llm_call_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                turn INTEGER NOT NULL,
                iteration INTEGER NOT NULL,
                model_name TEXT NOT NULL,
                prompt_tokens INTEGER,
                completion_tokens INTEGER,
                latency_ms INTEGER,
                ttft_ms INTEGER,
                success INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                user_id TEXT
            );
        ",
    },
    Migration {
        version: 5,
        description: "session_checkpoints, session_rules",
        sql: r"
            CREATE TABLE IF NOT EXISTS session_checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                checkpoint_type TEXT NOT NULL DEFAULT 'turn',
                state_json TEXT NOT NULL,
                task_list_json TEXT NOT NULL DEFAULT '[]',
                turn_number INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON session_checkpoints (session_id, id);
            CREATE TABLE IF NOT EXISTS session_rules (
                id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                content TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, id)
            );
        ",
    },
    Migration {
        version: 6,
        description: "workspace_files, config_kv",
        sql: r"
            CREATE TABLE IF NOT EXISTS workspace_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace TEXT NOT NULL,
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                mtime_ns INTEGER NOT NULL,
                sheets_json TEXT NOT NULL DEFAULT '[]',
                scanned_at TEXT NOT NULL,
                user_id TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_workspace_files ON workspace_files (workspace, path);
            CREATE TABLE IF NOT EXISTS config_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_config_kv (
                user_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (user_id, key)
            );
            CREATE TABLE IF NOT EXISTS model_profiles (
                name TEXT PRIMARY KEY,
                config_json TEXT NOT NULL
            );
        ",
    },
];

/// The highest version this binary knows how to apply.
#[must_use]
pub fn latest_version() -> i64 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

async fn ensure_version_table(db: &Database) -> DbResult<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        &[],
    )
    .await?;
    Ok(())
}

async fn applied_versions(db: &Database) -> DbResult<Vec<i64>> {
    let rows = db.query("SELECT version FROM schema_version", &[]).await?;
    rows.iter().map(|r| r.get::<i64>(0)).collect()
}

/// Apply every migration in [`MIGRATIONS`] not yet recorded in
/// `schema_version`, in ascending version order.
///
/// Idempotent: calling this twice in a row is a no-op the second time.
///
/// # Errors
///
/// Returns an error from the first migration that fails to apply; no
/// later migration runs, and the failing migration's own statements are
/// rolled back (its version is not recorded).
pub async fn migrate(db: &Database) -> DbResult<()> {
    ensure_version_table(db).await?;
    let applied = applied_versions(db).await?;

    let mut pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();
    pending.sort_by_key(|m| m.version);

    for migration in pending {
        info!(version = migration.version, description = migration.description, "applying migration");
        db.execute_script(migration.sql).await.map_err(|source| match source {
            crate::error::DbError::Query(e) => crate::error::DbError::Migration {
                version: migration.version,
                source: e,
            },
            other => other,
        })?;
        db.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
            &[Param::Int(migration.version), Param::text(chrono::Utc::now().to_rfc3339())],
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let first = applied_versions(&db).await.unwrap().len();
        migrate(&db).await.unwrap();
        let second = applied_versions(&db).await.unwrap().len();
        assert_eq!(first, second);
        assert_eq!(first as i64, latest_version());
    }

    #[tokio::test]
    async fn migrate_creates_expected_tables() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        for table in ["sessions", "messages", "memory_entries", "vector_records", "workspace_files"] {
            assert!(db.table_exists(table).await.unwrap(), "missing table {table}");
        }
    }
}
