//! Repeat-read loop detection, keyed by `(file, sheet, range, intent)`.
//!
//! A write against `(file, sheet)` resets all read counters for that
//! sheet — this deliberately spans every cached range and intent on the
//! sheet, not just the range the write touched, since a write can
//! invalidate conclusions drawn from reads anywhere on the sheet.

use std::collections::HashMap;

use crate::models::IntentTag;

/// Base warn/trip thresholds before intent-sensitive adjustment.
#[derive(Debug, Clone, Copy)]
pub struct RepeatThresholds {
    /// Repeat count at which a soft warning applies.
    pub warn: i64,
    /// Repeat count at which the adaptive mode selector downgrades.
    pub trip: i64,
}

/// Resolve the effective warn/trip thresholds for `intent`. Formula,
/// aggregate, and validate work legitimately re-reads the same range
/// (recomputation, cross-checking), so they use the base thresholds
/// unchanged; format/entry/general work gets relaxed (higher) warn and
/// trip floors, since those tools are re-invoked on the same range as
/// a matter of routine.
#[must_use]
pub fn repeat_threshold(intent: IntentTag, base_warn: i64, base_trip: i64) -> RepeatThresholds {
    let warn = base_warn.max(1);
    let trip = (warn + 1).max(base_trip);
    match intent {
        IntentTag::Aggregate | IntentTag::Validate | IntentTag::Formula => RepeatThresholds { warn, trip },
        IntentTag::Format | IntentTag::Entry | IntentTag::General => {
            let relaxed_warn = (warn + 1).max(3);
            let relaxed_trip = (relaxed_warn + 1).max(trip + 1).max(4);
            RepeatThresholds { warn: relaxed_warn, trip: relaxed_trip }
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReadKey {
    file_path: String,
    sheet_name: String,
    range_upper: String,
    intent: String,
}

/// Tracks repeated reads of the same range under the same intent.
#[derive(Debug, Default)]
pub struct RepeatDetector {
    counter: HashMap<ReadKey, i64>,
}

impl RepeatDetector {
    /// Build an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful read, returning the cumulative count for
    /// this exact `(file, sheet, range, intent)` key. Returns 0 (and
    /// records nothing) if any component is blank.
    pub fn record_read(&mut self, file_path: &str, sheet_name: &str, range_ref: &str, intent_tag: IntentTag) -> i64 {
        let file_path = file_path.trim();
        let sheet_name = sheet_name.trim();
        let range_upper = range_ref.trim().to_uppercase();
        if file_path.is_empty() || sheet_name.is_empty() || range_upper.is_empty() {
            return 0;
        }
        let key = ReadKey { file_path: file_path.to_string(), sheet_name: sheet_name.to_string(), range_upper, intent: intent_tag.as_str().to_string() };
        let next = self.counter.get(&key).copied().unwrap_or(0) + 1;
        self.counter.insert(key, next);
        next
    }

    /// Reset every read counter for `(file, sheet)`, regardless of
    /// range or intent.
    pub fn record_write(&mut self, file_path: &str, sheet_name: &str) {
        let file_path = file_path.trim();
        let sheet_name = sheet_name.trim();
        if file_path.is_empty() || sheet_name.is_empty() {
            return;
        }
        self.counter.retain(|key, _| !(key.file_path == file_path && key.sheet_name == sheet_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_reads_increment_the_same_key() {
        let mut detector = RepeatDetector::new();
        assert_eq!(detector.record_read("a.xlsx", "Sheet1", "A1:B2", IntentTag::General), 1);
        assert_eq!(detector.record_read("a.xlsx", "Sheet1", "a1:b2", IntentTag::General), 2);
    }

    #[test]
    fn different_intent_is_a_different_key() {
        let mut detector = RepeatDetector::new();
        detector.record_read("a.xlsx", "Sheet1", "A1:B2", IntentTag::General);
        assert_eq!(detector.record_read("a.xlsx", "Sheet1", "A1:B2", IntentTag::Formula), 1);
    }

    #[test]
    fn write_resets_every_read_counter_on_the_sheet() {
        let mut detector = RepeatDetector::new();
        detector.record_read("a.xlsx", "Sheet1", "A1:B2", IntentTag::General);
        detector.record_read("a.xlsx", "Sheet1", "C1:D2", IntentTag::Formula);
        detector.record_write("a.xlsx", "Sheet1");
        assert_eq!(detector.record_read("a.xlsx", "Sheet1", "A1:B2", IntentTag::General), 1);
        assert_eq!(detector.record_read("a.xlsx", "Sheet1", "C1:D2", IntentTag::Formula), 1);
    }

    #[test]
    fn relaxed_thresholds_for_general_raise_both_warn_and_trip() {
        let t = repeat_threshold(IntentTag::General, 2, 3);
        assert_eq!(t.warn, 3);
        assert_eq!(t.trip, 4);
    }

    #[test]
    fn strict_intents_use_base_thresholds() {
        let t = repeat_threshold(IntentTag::Formula, 2, 3);
        assert_eq!(t.warn, 2);
        assert_eq!(t.trip, 3);
    }
}
