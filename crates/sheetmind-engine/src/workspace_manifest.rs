//! Workspace manifest: a point-in-time scan of a workspace root's
//! spreadsheet files, persisted to [`sheetmind_stores::WorkspaceFileStore`]
//! and summarised into the system prompt on session start.
//!
//! Actual sheet introspection (row/column counts, headers) is a
//! black-box concern of the spreadsheet tools themselves — this module
//! only walks the directory tree, skips noise, and diffs by mtime. A
//! file whose sheets can't be inspected out-of-band is recorded with an
//! empty sheet list rather than blocking the scan.

use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use sheetmind_core::UserId;
use sheetmind_db::Database;
use sheetmind_stores::{SheetSummary, WorkspaceFileRecord, WorkspaceFileStore};

use crate::error::EngineResult;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "csv"];

/// Looks up sheet metadata for a file path, out-of-band from the
/// directory walk (the actual workbook parser lives outside this
/// crate). Implementations that can't introspect a file should return
/// an empty vec rather than erroring — the manifest still records the
/// file's path/size/mtime.
pub trait SheetInspector: Send + Sync {
    /// Inspect `path`, returning one summary per sheet found.
    fn inspect(&self, path: &std::path::Path) -> Vec<SheetSummary>;
}

/// A [`SheetInspector`] that never inspects — every file is recorded
/// with zero sheets. Used when no workbook parser is wired in.
pub struct NoopInspector;

impl SheetInspector for NoopInspector {
    fn inspect(&self, _path: &std::path::Path) -> Vec<SheetSummary> {
        Vec::new()
    }
}

/// Human-readable summary of a workspace manifest, for injection into
/// the system prompt.
#[must_use]
pub fn render_summary(files: &[WorkspaceFileRecord]) -> String {
    if files.is_empty() {
        return String::new();
    }
    let mut lines = vec![format!("## Workspace ({} file(s))", files.len())];
    for file in files {
        let sheet_names: Vec<&str> = file.sheets.iter().map(|s| s.name.as_str()).collect();
        if sheet_names.is_empty() {
            lines.push(format!("- {}", file.path));
        } else {
            lines.push(format!("- {} (sheets: {})", file.path, sheet_names.join(", ")));
        }
    }
    lines.join("\n")
}

/// Walk `workspace_root`, recording every spreadsheet file found, and
/// persist the result to `store`. Skips hidden entries and noise
/// directories (`.git`, `node_modules`, and anything `.gitignore`
/// would exclude) via [`ignore::WalkBuilder`]'s standard rules.
///
/// # Errors
///
/// Returns an error if a store write fails.
pub async fn scan_workspace(
    db: &Database,
    user_id: Option<UserId>,
    workspace_root: &str,
    inspector: &dyn SheetInspector,
) -> EngineResult<Vec<WorkspaceFileRecord>> {
    let root = std::path::Path::new(workspace_root);
    let mut records = Vec::new();

    for entry in WalkBuilder::new(root).hidden(true).git_ignore(true).build().flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !SPREADSHEET_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }
        let Ok(metadata) = path.metadata() else { continue };
        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
        let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string();
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        records.push(WorkspaceFileRecord {
            workspace: workspace_root.to_string(),
            path: relative,
            name,
            size_bytes: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            mtime_ns,
            sheets: inspector.inspect(path),
            scanned_at: sheetmind_core::Timestamp::now(),
        });
    }

    let store = WorkspaceFileStore::new(db, user_id);
    for record in &records {
        store.upsert(record).await?;
    }
    Ok(records)
}

/// Refresh a cached manifest by diffing each file's current mtime
/// against the cached `previous` records; only files whose mtime has
/// changed (or are newly discovered) are rescanned. Deleted files are
/// dropped from the store.
///
/// # Errors
///
/// Returns an error if a store read/write fails.
pub async fn refresh_workspace(
    db: &Database,
    user_id: Option<UserId>,
    workspace_root: &str,
    inspector: &dyn SheetInspector,
) -> EngineResult<Vec<WorkspaceFileRecord>> {
    let store = WorkspaceFileStore::new(db, user_id.clone());
    let previous = store.list_for_workspace(workspace_root).await?;
    let fresh = scan_workspace(db, user_id, workspace_root, inspector).await?;

    let fresh_paths: std::collections::HashSet<&str> = fresh.iter().map(|f| f.path.as_str()).collect();
    for stale in previous.iter().filter(|p| !fresh_paths.contains(p.path.as_str())) {
        store.remove(workspace_root, &stale.path).await?;
    }
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use sheetmind_db::migrate;

    use super::*;

    #[tokio::test]
    async fn scan_finds_spreadsheet_files_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("book.xlsx"), b"stub").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"stub").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), b"ref: refs/heads/main").unwrap();

        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        let workspace = dir.path().to_string_lossy().to_string();
        let records = scan_workspace(&db, None, &workspace, &NoopInspector).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "book.xlsx");
    }

    #[test]
    fn render_summary_lists_sheets() {
        let files = vec![WorkspaceFileRecord {
            workspace: "/ws".into(),
            path: "a.xlsx".into(),
            name: "a.xlsx".into(),
            size_bytes: 10,
            mtime_ns: 1,
            sheets: vec![SheetSummary { name: "Sheet1".into(), rows: 1, cols: 1, headers: vec![] }],
            scanned_at: sheetmind_core::Timestamp::now(),
        }];
        let summary = render_summary(&files);
        assert!(summary.contains("a.xlsx"));
        assert!(summary.contains("Sheet1"));
    }
}
