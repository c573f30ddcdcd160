//! Category ↔ topic-file mapping.
//!
//! Every category has its own topic file; the core `MEMORY.md` file is
//! maintained separately by the persistence layer as the union of all
//! categories.

use sheetmind_stores::MemoryCategory;

/// The aggregate markdown file holding every category's entries.
pub const CORE_MEMORY_FILE: &str = "MEMORY.md";

/// The per-category topic file name.
#[must_use]
pub fn topic_file(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::FilePattern => "file_patterns.md",
        MemoryCategory::UserPref => "user_prefs.md",
        MemoryCategory::ErrorSolution => "error_solutions.md",
        MemoryCategory::General => "general.md",
    }
}

/// Resolve a topic file name (as passed to `memory_read_topic`) back to
/// its category, if it names a known topic.
#[must_use]
pub fn infer_category_by_filename(filename: &str) -> Option<MemoryCategory> {
    [
        MemoryCategory::FilePattern,
        MemoryCategory::UserPref,
        MemoryCategory::ErrorSolution,
        MemoryCategory::General,
    ]
    .into_iter()
    .find(|&category| topic_file(category) == filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_round_trips_every_category() {
        for category in [
            MemoryCategory::FilePattern,
            MemoryCategory::UserPref,
            MemoryCategory::ErrorSolution,
            MemoryCategory::General,
        ] {
            let filename = topic_file(category);
            assert_eq!(infer_category_by_filename(filename), Some(category));
        }
    }

    #[test]
    fn infer_rejects_unknown_filename() {
        assert_eq!(infer_category_by_filename("unknown.md"), None);
    }
}
