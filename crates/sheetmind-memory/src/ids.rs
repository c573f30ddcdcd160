//! Deterministic entry ids, computed the same way on every backend so an
//! id assigned by the file backend still resolves after a DB migration.

use sheetmind_core::memory_entry_id;

use crate::markdown::{category_str, ParsedEntry};

/// The stable 12-hex id for a parsed entry (category + content +
/// timestamp, per [`memory_entry_id`]).
#[must_use]
pub fn entry_id(entry: &ParsedEntry) -> String {
    let timestamp = entry.timestamp.and_utc().to_rfc3339();
    memory_entry_id(category_str(entry.category), &entry.content, &timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use sheetmind_stores::MemoryCategory;

    #[test]
    fn same_entry_produces_same_id() {
        let entry = ParsedEntry {
            category: MemoryCategory::General,
            content: "a fact".to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-01 12:00", "%Y-%m-%d %H:%M").unwrap(),
        };
        assert_eq!(entry_id(&entry), entry_id(&entry));
    }
}
