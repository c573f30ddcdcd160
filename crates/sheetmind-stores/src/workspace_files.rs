//! Workspace file registry — the persisted half of `WorkspaceManifest`
//! scans, keyed by (workspace, path).

use sheetmind_core::{Timestamp, UserId};
use sheetmind_db::{Database, Param};

use crate::error::StoreResult;
use crate::scope::UserFilter;

/// One sheet discovered inside a workbook file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SheetSummary {
    /// Sheet name.
    pub name: String,
    /// Row count at scan time.
    pub rows: i64,
    /// Column count at scan time.
    pub cols: i64,
    /// First-row header labels, if detected.
    pub headers: Vec<String>,
}

/// A scanned workbook file.
#[derive(Debug, Clone)]
pub struct WorkspaceFileRecord {
    /// Workspace root this file belongs to.
    pub workspace: String,
    /// Path relative to the workspace root.
    pub path: String,
    /// File name (last path component).
    pub name: String,
    /// Size in bytes at scan time.
    pub size_bytes: i64,
    /// Modification time in nanoseconds since the epoch, for incremental diffing.
    pub mtime_ns: i64,
    /// Sheets discovered inside this file.
    pub sheets: Vec<SheetSummary>,
    /// When this record was (re)scanned.
    pub scanned_at: Timestamp,
}

/// CRUD access to the `workspace_files` table.
pub struct WorkspaceFileStore<'a> {
    db: &'a Database,
    user_id: Option<UserId>,
}

impl<'a> WorkspaceFileStore<'a> {
    /// Build a store scoped to `user_id`.
    #[must_use]
    pub fn new(db: &'a Database, user_id: Option<UserId>) -> Self {
        Self { db, user_id }
    }

    /// Insert or refresh a scanned file's record (UNIQUE(workspace, path)
    /// — a rescan replaces the prior row's size/mtime/sheets).
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, record: &WorkspaceFileRecord) -> StoreResult<()> {
        let sheets_json = serde_json::to_string(&record.sheets)?;
        self.db
            .execute(
                "INSERT OR REPLACE INTO workspace_files \
                 (workspace, path, name, size_bytes, mtime_ns, sheets_json, scanned_at, user_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Param::text(&record.workspace),
                    Param::text(&record.path),
                    Param::text(&record.name),
                    Param::Int(record.size_bytes),
                    Param::Int(record.mtime_ns),
                    Param::text(sheets_json),
                    Param::text(record.scanned_at.to_rfc3339()),
                    UserFilter::bind_value(self.user_id.as_ref()),
                ],
            )
            .await?;
        Ok(())
    }

    /// List every file scanned for a workspace root.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_workspace(&self, workspace: &str) -> StoreResult<Vec<WorkspaceFileRecord>> {
        let rows = self
            .db
            .query(
                "SELECT workspace, path, name, size_bytes, mtime_ns, sheets_json, scanned_at \
                 FROM workspace_files WHERE workspace = ? ORDER BY path ASC",
                &[Param::text(workspace)],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(WorkspaceFileRecord {
                    workspace: row.get_named("workspace")?,
                    path: row.get_named("path")?,
                    name: row.get_named("name")?,
                    size_bytes: row.get_named("size_bytes")?,
                    mtime_ns: row.get_named("mtime_ns")?,
                    sheets: serde_json::from_str(&row.get_named::<String>("sheets_json")?)?,
                    scanned_at: Timestamp::parse_rfc3339(&row.get_named::<String>("scanned_at")?)
                        .map_err(|e| crate::error::StoreError::Invariant(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Remove a file's record (it disappeared from the workspace).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove(&self, workspace: &str, path: &str) -> StoreResult<()> {
        self.db
            .execute(
                "DELETE FROM workspace_files WHERE workspace = ? AND path = ?",
                &[Param::text(workspace), Param::text(path)],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_db::migrate;

    #[tokio::test]
    async fn upsert_replaces_existing_scan() {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let store = WorkspaceFileStore::new(&db, None);
        let mut record = WorkspaceFileRecord {
            workspace: "/ws".into(),
            path: "book.xlsx".into(),
            name: "book.xlsx".into(),
            size_bytes: 100,
            mtime_ns: 1,
            sheets: vec![],
            scanned_at: Timestamp::now(),
        };
        store.upsert(&record).await.unwrap();
        record.size_bytes = 200;
        record.mtime_ns = 2;
        store.upsert(&record).await.unwrap();
        let files = store.list_for_workspace("/ws").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size_bytes, 200);
    }
}
