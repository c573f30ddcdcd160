//! Markdown-file-backed [`MemoryStorageBackend`].
//!
//! Each category has its own topic file (`file_patterns.md`, …) plus a
//! `MEMORY.md` aggregate holding every category's entries. Writes are
//! atomic (write to a tempfile in the same directory, fsync, rename).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sheetmind_core::hash::normalize_content;
use sheetmind_stores::MemoryCategory;
use tracing::warn;

use crate::backend::MemoryStorageBackend;
use crate::error::MemoryResult;
use crate::markdown::{dedupe_new_entries, format_entries, parse_entries, ParsedEntry};
use crate::topics::{topic_file, CORE_MEMORY_FILE};

const RECENT_DEDUPE_WINDOW: usize = 200;
const CAPACITY_TRIGGER_LINES: usize = 500;
const CAPACITY_KEEP_LINES: usize = 400;

/// Legacy markdown-file memory backend.
pub struct FileMemoryBackend {
    memory_dir: PathBuf,
}

impl FileMemoryBackend {
    /// Build a backend rooted at `memory_dir`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(memory_dir: impl Into<PathBuf>) -> MemoryResult<Self> {
        let memory_dir = memory_dir.into();
        std::fs::create_dir_all(&memory_dir)?;
        Ok(Self { memory_dir })
    }

    /// The directory this backend is rooted at.
    #[must_use]
    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    fn read(&self, filename: &str) -> MemoryResult<String> {
        let path = self.memory_dir.join(filename);
        if !path.exists() {
            return Ok(String::new());
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn atomic_write(&self, filename: &str, content: &str) -> MemoryResult<()> {
        let path = self.memory_dir.join(filename);
        let tmp = tempfile::NamedTempFile::new_in(&self.memory_dir)?;
        std::fs::write(tmp.path(), content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn enforce_capacity(&self, filename: &str) -> MemoryResult<()> {
        let text = self.read(filename)?;
        if text.is_empty() {
            return Ok(());
        }
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() <= CAPACITY_TRIGGER_LINES {
            return Ok(());
        }
        let entry_starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| crate::markdown::is_entry_header(line))
            .map(|(i, _)| i)
            .collect();

        let kept_start = if entry_starts.is_empty() {
            lines.len().saturating_sub(CAPACITY_KEEP_LINES)
        } else {
            let last = *entry_starts.last().expect("non-empty");
            if lines.len() - last > CAPACITY_KEEP_LINES {
                lines.len().saturating_sub(CAPACITY_KEEP_LINES)
            } else {
                let mut kept_start = last;
                for &start in entry_starts.iter().rev() {
                    if lines.len() - start <= CAPACITY_KEEP_LINES {
                        kept_start = start;
                    } else {
                        break;
                    }
                }
                kept_start
            }
        };
        let kept = lines[kept_start..].join("\n");
        self.atomic_write(filename, &kept)
    }

    fn write_entries_into(&self, filename: &str, new_entries: &[ParsedEntry], extra_seen: &HashSet<(String, String)>) -> MemoryResult<()> {
        let existing_text = self.read(filename)?;
        let existing_entries = parse_entries(&existing_text);
        let filtered = dedupe_new_entries(&existing_entries, new_entries.to_vec(), extra_seen);
        if filtered.is_empty() {
            return Ok(());
        }
        let new_content = format_entries(&filtered);
        let combined = if existing_text.trim().is_empty() {
            new_content
        } else {
            format!("{}\n\n{}", existing_text.trim_end_matches('\n'), new_content)
        };
        self.atomic_write(filename, &combined)?;
        self.enforce_capacity(filename)
    }
}

#[async_trait]
impl MemoryStorageBackend for FileMemoryBackend {
    async fn load_core(&self, limit: usize) -> MemoryResult<String> {
        let text = self.read(CORE_MEMORY_FILE)?;
        if text.is_empty() {
            return Ok(String::new());
        }
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() <= limit {
            return Ok(text.trim_end_matches('\n').to_string());
        }
        let mut selected = &lines[lines.len() - limit..];
        if let Some(offset) = selected.iter().position(|line| crate::markdown::is_entry_header(line)) {
            selected = &selected[offset..];
        }
        Ok(selected.join("\n").trim_end_matches('\n').to_string())
    }

    async fn load_by_category(&self, category: MemoryCategory) -> MemoryResult<Vec<ParsedEntry>> {
        let text = self.read(topic_file(category))?;
        Ok(parse_entries(&text).into_iter().filter(|e| e.category == category).collect())
    }

    async fn load_all(&self) -> MemoryResult<Vec<ParsedEntry>> {
        Ok(parse_entries(&self.read(CORE_MEMORY_FILE)?))
    }

    async fn save_entries(&self, entries: Vec<ParsedEntry>, _source: &str) -> MemoryResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut grouped: HashMap<&'static str, Vec<ParsedEntry>> = HashMap::new();
        for entry in &entries {
            grouped.entry(topic_file(entry.category)).or_default().push(entry.clone());
        }
        grouped.entry(CORE_MEMORY_FILE).or_default().extend(entries);

        let mut global_seen = HashSet::new();
        for filename in grouped.keys() {
            let text = self.read(filename)?;
            let parsed = parse_entries(&text);
            let start = parsed.len().saturating_sub(RECENT_DEDUPE_WINDOW);
            for entry in &parsed[start..] {
                let normalized = normalize_content(&entry.content);
                if !normalized.is_empty() {
                    global_seen.insert((topic_file(entry.category).to_string(), normalized));
                }
            }
        }

        for (filename, file_entries) in grouped {
            if let Err(e) = self.write_entries_into(filename, &file_entries, &global_seen) {
                warn!(filename, error = %e, "failed to write memory file");
            }
        }
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> MemoryResult<bool> {
        let mut deleted = false;
        let mut filenames = vec![CORE_MEMORY_FILE.to_string()];
        filenames.extend(
            [
                MemoryCategory::FilePattern,
                MemoryCategory::UserPref,
                MemoryCategory::ErrorSolution,
                MemoryCategory::General,
            ]
            .map(|c| topic_file(c).to_string()),
        );
        for filename in filenames {
            let text = self.read(&filename)?;
            if text.is_empty() {
                continue;
            }
            let entries = parse_entries(&text);
            let before = entries.len();
            let filtered: Vec<_> = entries.into_iter().filter(|e| crate::ids::entry_id(e) != id).collect();
            if filtered.len() < before {
                deleted = true;
                if filtered.is_empty() {
                    let _ = std::fs::remove_file(self.memory_dir.join(&filename));
                } else {
                    self.atomic_write(&filename, &format_entries(&filtered))?;
                }
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn entry(category: MemoryCategory, content: &str) -> ParsedEntry {
        ParsedEntry {
            category,
            content: content.to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-01 12:00", "%Y-%m-%d %H:%M").unwrap(),
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trips_through_topic_and_core_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileMemoryBackend::new(dir.path()).unwrap();
        backend.save_entries(vec![entry(MemoryCategory::UserPref, "likes dark mode")], "tool").await.unwrap();
        let topic = backend.load_by_category(MemoryCategory::UserPref).await.unwrap();
        assert_eq!(topic.len(), 1);
        let core = backend.load_all().await.unwrap();
        assert_eq!(core.len(), 1);
    }

    #[tokio::test]
    async fn save_entries_dedups_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileMemoryBackend::new(dir.path()).unwrap();
        backend.save_entries(vec![entry(MemoryCategory::General, "fact")], "tool").await.unwrap();
        backend.save_entries(vec![entry(MemoryCategory::General, "fact")], "tool").await.unwrap();
        assert_eq!(backend.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enforce_capacity_truncates_oversized_core_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileMemoryBackend::new(dir.path()).unwrap();
        let many: Vec<_> = (0..200).map(|i| entry(MemoryCategory::General, &format!("fact number {i}"))).collect();
        backend.save_entries(many, "tool").await.unwrap();
        let text = backend.read(CORE_MEMORY_FILE).unwrap();
        assert!(text.split('\n').count() <= CAPACITY_KEEP_LINES + 5);
    }
}
