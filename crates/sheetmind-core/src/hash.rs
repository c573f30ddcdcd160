//! Content hashing for dedup keys.
//!
//! Every store that dedups by content (memory entries, vector records)
//! uses the same normalisation and truncation rules, so the logic lives
//! here once.

use sha2::{Digest, Sha256};

/// Collapse all whitespace runs in `text` to single spaces and trim the
/// ends, matching `" ".join(text.split())` from the reference
/// implementation.
#[must_use]
pub fn normalize_content(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of `data`, rendered as lowercase hex and truncated to `len`
/// characters (`len` must be <= 64).
#[must_use]
pub fn hash_hex(data: &[u8], len: usize) -> String {
    let digest = Sha256::digest(data);
    let full = hex::encode(digest);
    full.chars().take(len).collect()
}

/// The 16-hex-char dedup hash used by the memory store and the vector
/// index: SHA-256 of the normalised content, optionally prefixed with
/// `"{user_id}::"` so identical content from different users never
/// collides.
#[must_use]
pub fn content_hash(user_id: Option<&str>, text: &str) -> String {
    let normalized = normalize_content(text);
    let keyed = match user_id {
        Some(uid) => format!("{uid}::{normalized}"),
        None => normalized,
    };
    hash_hex(keyed.as_bytes(), 16)
}

/// The 12-hex-char id assigned to a new `MemoryEntry`: a hash of
/// `category + content prefix + timestamp`, distinguishing entries saved
/// in the same millisecond.
#[must_use]
pub fn memory_entry_id(category: &str, content: &str, timestamp_rfc3339: &str) -> String {
    let content_prefix: String = content.chars().take(64).collect();
    let seed = format!("{category}|{content_prefix}|{timestamp_rfc3339}");
    hash_hex(seed.as_bytes(), 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_content("  a\n\tb   c "), "a b c");
    }

    #[test]
    fn content_hash_is_16_hex_chars() {
        let h = content_hash(None, "hello world");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_hash_differs_by_user() {
        let a = content_hash(Some("u1"), "same text");
        let b = content_hash(Some("u2"), "same text");
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_ignores_whitespace_differences() {
        let a = content_hash(None, "hello   world");
        let b = content_hash(None, "hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn memory_entry_id_is_12_hex_chars() {
        let id = memory_entry_id("general", "some content", "2026-01-01T00:00:00Z");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
