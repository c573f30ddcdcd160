//! Minimal A1-notation range parsing: enough to support geometric
//! connectivity checks and row/column patching in [`crate::ingest`]
//! without pulling in a full spreadsheet-file dependency.

/// Inclusive 1-based bounding box of an A1-style range (e.g. `"B2:D10"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBounds {
    /// Leftmost column, 1-based.
    pub min_col: i64,
    /// Topmost row, 1-based.
    pub min_row: i64,
    /// Rightmost column, 1-based.
    pub max_col: i64,
    /// Bottommost row, 1-based.
    pub max_row: i64,
}

/// Parse `"A1"` or `"A1:B10"` into its bounding box. Returns `None` for
/// anything that doesn't look like a valid A1 reference.
#[must_use]
pub fn parse_range(range_ref: &str) -> Option<RangeBounds> {
    let range_ref = range_ref.trim();
    if range_ref.is_empty() {
        return None;
    }
    let mut parts = range_ref.splitn(2, ':');
    let start = parts.next()?;
    let end = parts.next().unwrap_or(start);
    let (start_col, start_row) = parse_cell(start)?;
    let (end_col, end_row) = parse_cell(end)?;
    Some(RangeBounds {
        min_col: start_col.min(end_col),
        min_row: start_row.min(end_row),
        max_col: start_col.max(end_col),
        max_row: start_row.max(end_row),
    })
}

fn parse_cell(cell: &str) -> Option<(i64, i64)> {
    let cell = cell.trim();
    let col_end = cell.find(|c: char| c.is_ascii_digit())?;
    if col_end == 0 {
        return None;
    }
    let col_letters = &cell[..col_end];
    let row_digits = &cell[col_end..];
    if !col_letters.chars().all(|c| c.is_ascii_alphabetic()) || row_digits.is_empty() {
        return None;
    }
    let col = column_letters_to_index(col_letters);
    let row: i64 = row_digits.parse().ok()?;
    Some((col, row))
}

/// Convert `"A"` -> 1, `"Z"` -> 26, `"AA"` -> 27, matching spreadsheet
/// column-letter arithmetic.
#[must_use]
pub fn column_letters_to_index(letters: &str) -> i64 {
    letters.to_uppercase().chars().fold(0i64, |acc, c| acc * 26 + i64::from(c as u8 - b'A' + 1))
}

/// Convert a 1-based column index back to letters: 1 -> `"A"`, 27 -> `"AA"`.
#[must_use]
pub fn column_index_to_letters(mut index: i64) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let remainder = (index - 1) % 26;
        letters.push((b'A' + u8::try_from(remainder).unwrap_or(0)) as char);
        index = (index - 1) / 26;
    }
    letters.reverse();
    letters.into_iter().collect()
}

/// Format a bounding box back into an A1-style range string.
#[must_use]
pub fn format_range(bounds: RangeBounds) -> String {
    format!("{}{}:{}{}", column_index_to_letters(bounds.min_col), bounds.min_row, column_index_to_letters(bounds.max_col), bounds.max_row)
}

/// Whether two ranges overlap or touch with no gap between them.
#[must_use]
pub fn is_adjacent_or_overlapping(range_a: &str, range_b: &str) -> bool {
    let (Some(a), Some(b)) = (parse_range(range_a), parse_range(range_b)) else {
        return false;
    };
    let col_gap = (a.min_col.max(b.min_col) - a.max_col.min(b.max_col) - 1).max(0);
    let row_gap = (a.min_row.max(b.min_row) - a.max_row.min(b.max_row) - 1).max(0);
    col_gap == 0 && row_gap == 0
}

/// The smallest bounding box that contains both ranges. Falls back to
/// `range_a` unchanged if either side fails to parse.
#[must_use]
pub fn union_range(range_a: &str, range_b: &str) -> String {
    let (Some(a), Some(b)) = (parse_range(range_a), parse_range(range_b)) else {
        return range_a.to_string();
    };
    format_range(RangeBounds {
        min_col: a.min_col.min(b.min_col),
        min_row: a.min_row.min(b.min_row),
        max_col: a.max_col.max(b.max_col),
        max_row: a.max_row.max(b.max_row),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_cell_and_range() {
        assert_eq!(parse_range("B2"), Some(RangeBounds { min_col: 2, min_row: 2, max_col: 2, max_row: 2 }));
        assert_eq!(parse_range("A1:C10"), Some(RangeBounds { min_col: 1, min_row: 1, max_col: 3, max_row: 10 }));
    }

    #[test]
    fn column_letter_round_trips() {
        assert_eq!(column_letters_to_index("A"), 1);
        assert_eq!(column_letters_to_index("Z"), 26);
        assert_eq!(column_letters_to_index("AA"), 27);
        assert_eq!(column_index_to_letters(27), "AA");
    }

    #[test]
    fn adjacent_ranges_are_connected() {
        assert!(is_adjacent_or_overlapping("A1:B5", "A6:B10"));
        assert!(is_adjacent_or_overlapping("A1:B5", "A3:B8"));
        assert!(!is_adjacent_or_overlapping("A1:B5", "A7:B10"));
    }

    #[test]
    fn union_range_produces_bounding_box() {
        assert_eq!(union_range("A1:B5", "C6:D10"), "A1:D10");
    }
}
