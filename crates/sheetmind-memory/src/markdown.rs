//! Markdown (de)serialisation for the file-backed memory store, and the
//! dedup logic shared between the file and DB backends.
//!
//! Entries are rendered as:
//! ```text
//! ### [YYYY-MM-DD HH:MM] <category>
//!
//! <body>
//!
//! ---
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use sheetmind_core::hash::normalize_content;
use sheetmind_stores::MemoryCategory;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M";

static ENTRY_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###\s+\[(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2})]\s+(\S+)\s*$").expect("valid regex"));

/// A parsed, not-yet-persisted memory entry (no id or source yet — those
/// are assigned by the store on save).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    /// Category name as it appeared in the header.
    pub category: MemoryCategory,
    /// Entry body, trimmed.
    pub content: String,
    /// Entry timestamp, minute precision (matches the header format).
    pub timestamp: NaiveDateTime,
}

/// Render entries to the markdown format above, joined by a blank line.
#[must_use]
pub fn format_entries(entries: &[ParsedEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let ts = entry.timestamp.format(TIMESTAMP_FMT);
            format!("### [{ts}] {}\n\n{}\n\n---", category_str(entry.category), entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Whether `line` is a `### [timestamp] category` entry header.
#[must_use]
pub(crate) fn is_entry_header(line: &str) -> bool {
    ENTRY_HEADER_RE.is_match(line)
}

/// The stored string form of a category, as written in entry headers.
#[must_use]
pub(crate) fn category_str(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::FilePattern => "file_pattern",
        MemoryCategory::UserPref => "user_pref",
        MemoryCategory::ErrorSolution => "error_solution",
        MemoryCategory::General => "general",
    }
}

fn parse_category(s: &str) -> Option<MemoryCategory> {
    match s {
        "file_pattern" => Some(MemoryCategory::FilePattern),
        "user_pref" => Some(MemoryCategory::UserPref),
        "error_solution" => Some(MemoryCategory::ErrorSolution),
        "general" => Some(MemoryCategory::General),
        _ => None,
    }
}

/// Parse markdown-formatted memory content back into entries. Entries
/// with an unrecognised category, a malformed timestamp, or an empty
/// body are skipped.
#[must_use]
pub fn parse_entries(content: &str) -> Vec<ParsedEntry> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(captures) = ENTRY_HEADER_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let ts_str = &captures[1];
        let cat_str = &captures[2];
        let (Ok(timestamp), Some(category)) = (NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FMT), parse_category(cat_str)) else {
            i += 1;
            continue;
        };
        i += 1;
        let mut body_lines = Vec::new();
        while i < lines.len() {
            if lines[i].trim() == "---" {
                i += 1;
                break;
            }
            body_lines.push(lines[i]);
            i += 1;
        }
        let body = body_lines.join("\n").trim().to_string();
        if body.is_empty() {
            continue;
        }
        entries.push(ParsedEntry { category, content: body, timestamp });
    }
    entries
}

const RECENT_DEDUPE_WINDOW: usize = 200;

/// Drop any `new_entries` whose (category, normalised content) already
/// appears in the last [`RECENT_DEDUPE_WINDOW`] of `existing_entries`, in
/// `extra_seen_keys`, or earlier in this same batch.
#[must_use]
pub fn dedupe_new_entries(
    existing_entries: &[ParsedEntry],
    new_entries: Vec<ParsedEntry>,
    extra_seen_keys: &HashSet<(String, String)>,
) -> Vec<ParsedEntry> {
    let recent_start = existing_entries.len().saturating_sub(RECENT_DEDUPE_WINDOW);
    let mut seen: HashSet<(String, String)> = existing_entries[recent_start..]
        .iter()
        .filter_map(|e| {
            let normalized = normalize_content(&e.content);
            (!normalized.is_empty()).then(|| (category_str(e.category).to_string(), normalized))
        })
        .collect();
    seen.extend(extra_seen_keys.iter().cloned());

    let mut result = Vec::new();
    for entry in new_entries {
        let normalized = normalize_content(&entry.content);
        if normalized.is_empty() {
            continue;
        }
        let key = (category_str(entry.category).to_string(), normalized);
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        result.push(entry);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: MemoryCategory, content: &str) -> ParsedEntry {
        ParsedEntry {
            category,
            content: content.to_string(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-01 12:00", TIMESTAMP_FMT).unwrap(),
        }
    }

    #[test]
    fn format_then_parse_round_trips() {
        let entries = vec![entry(MemoryCategory::General, "likes dark mode")];
        let rendered = format_entries(&entries);
        let parsed = parse_entries(&rendered);
        assert_eq!(parsed, entries);
    }

    #[test]
    fn parse_skips_entries_with_unknown_category() {
        let text = "### [2026-01-01 12:00] mystery\n\nbody\n\n---";
        assert!(parse_entries(text).is_empty());
    }

    #[test]
    fn parse_skips_entries_with_empty_body() {
        let text = "### [2026-01-01 12:00] general\n\n\n---";
        assert!(parse_entries(text).is_empty());
    }

    #[test]
    fn dedupe_drops_existing_and_intra_batch_duplicates() {
        let existing = vec![entry(MemoryCategory::General, "fact one")];
        let new_entries = vec![
            entry(MemoryCategory::General, "fact one"),
            entry(MemoryCategory::General, "fact two"),
            entry(MemoryCategory::General, "fact two"),
        ];
        let result = dedupe_new_entries(&existing, new_entries, &HashSet::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content, "fact two");
    }
}
