//! SQL dialect rewriting.
//!
//! All application SQL is written once, in SQLite syntax, with `?`
//! placeholders. When the active backend is Postgres this module rewrites
//! the statement text before it is sent: placeholders become positional
//! (`$1`, `$2`, ...), and the two SQLite upsert idioms the stores rely on
//! are translated to their `ON CONFLICT` equivalents. This is plain text
//! transformation, not something `sqlx::Any` is asked to paper over, so
//! the rewrite rules are easy to unit test in isolation.

use std::fmt;

/// Which backend a [`crate::Database`] is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite — the native dialect; no rewriting needed.
    Sqlite,
    /// Postgres — placeholders and upsert syntax are rewritten.
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Rewrite a SQLite-dialect statement for `dialect`.
///
/// For [`Dialect::Sqlite`] this is the identity function. For
/// [`Dialect::Postgres`] it:
///
/// 1. Rewrites `INSERT OR IGNORE INTO t (...) VALUES (...)` to
///    `INSERT INTO t (...) VALUES (...) ON CONFLICT DO NOTHING`.
/// 2. Rewrites `INSERT OR REPLACE INTO t (c0, c1, ...) VALUES (...)` to
///    `INSERT INTO t (...) VALUES (...) ON CONFLICT (c0) DO UPDATE SET
///    c1 = EXCLUDED.c1, ...` — or, when there is only one column,
///    `ON CONFLICT (c0) DO NOTHING` (there is nothing to update).
/// 3. Rewrites every `?` placeholder to `$1`, `$2`, ... in source order.
///
/// Rewriting is line/statement oriented and assumes the conventions the
/// stores actually use (one `INSERT OR ...` per statement, column list
/// immediately after the table name); it is not a general SQL parser.
#[must_use]
pub fn rewrite(sql: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Sqlite => sql.to_string(),
        Dialect::Postgres => {
            let rewritten = rewrite_insert_or_ignore(sql);
            let rewritten = rewrite_insert_or_replace(&rewritten);
            renumber_placeholders(&rewritten)
        },
    }
}

fn rewrite_insert_or_ignore(sql: &str) -> String {
    const MARKER: &str = "INSERT OR IGNORE INTO";
    let Some(pos) = sql.to_ascii_uppercase().find(MARKER) else {
        return sql.to_string();
    };
    let before = &sql[..pos];
    let after = &sql[pos + MARKER.len()..];
    format!("{before}INSERT INTO{after} ON CONFLICT DO NOTHING")
}

fn rewrite_insert_or_replace(sql: &str) -> String {
    const MARKER: &str = "INSERT OR REPLACE INTO";
    let upper = sql.to_ascii_uppercase();
    let Some(pos) = upper.find(MARKER) else {
        return sql.to_string();
    };
    let before = &sql[..pos];
    let after_marker = &sql[pos + MARKER.len()..];

    let Some(open) = after_marker.find('(') else {
        return sql.to_string();
    };
    let Some(close_rel) = after_marker[open..].find(')') else {
        return sql.to_string();
    };
    let close = open + close_rel;

    let table_and_space = &after_marker[..open];
    let columns_raw = &after_marker[open + 1..close];
    let rest = &after_marker[close + 1..];

    let columns: Vec<&str> = columns_raw.split(',').map(str::trim).collect();
    let conflict_col = columns[0];
    let conflict_clause = if columns.len() <= 1 {
        format!("ON CONFLICT ({conflict_col}) DO NOTHING")
    } else {
        let sets: Vec<String> = columns[1..]
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        format!(
            "ON CONFLICT ({conflict_col}) DO UPDATE SET {}",
            sets.join(", ")
        )
    };

    format!(
        "{before}INSERT INTO{table_and_space}({columns_raw}){rest} {conflict_clause}",
        columns_raw = columns_raw,
    )
}

fn renumber_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut in_single_quote = false;
    for ch in sql.chars() {
        if ch == '\'' {
            in_single_quote = !in_single_quote;
            out.push(ch);
        } else if ch == '?' && !in_single_quote {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_is_identity() {
        let sql = "SELECT * FROM t WHERE id = ?";
        assert_eq!(rewrite(sql, Dialect::Sqlite), sql);
    }

    #[test]
    fn postgres_renumbers_placeholders() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        assert_eq!(
            rewrite(sql, Dialect::Postgres),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn postgres_rewrites_insert_or_ignore() {
        let sql = "INSERT OR IGNORE INTO memory_entries (id, content) VALUES (?, ?)";
        let got = rewrite(sql, Dialect::Postgres);
        assert_eq!(
            got,
            "INSERT INTO memory_entries (id, content) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn postgres_rewrites_insert_or_replace_multi_column() {
        let sql = "INSERT OR REPLACE INTO sessions (id, title, status) VALUES (?, ?, ?)";
        let got = rewrite(sql, Dialect::Postgres);
        assert_eq!(
            got,
            "INSERT INTO sessions (id, title, status) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, status = EXCLUDED.status"
        );
    }

    #[test]
    fn postgres_rewrites_insert_or_replace_single_column_to_do_nothing() {
        let sql = "INSERT OR REPLACE INTO schema_version (version) VALUES (?)";
        let got = rewrite(sql, Dialect::Postgres);
        assert_eq!(
            got,
            "INSERT INTO schema_version (version) VALUES ($1) ON CONFLICT (version) DO NOTHING"
        );
    }

    #[test]
    fn placeholder_inside_string_literal_is_not_renumbered() {
        let sql = "SELECT * FROM t WHERE note = 'a?b' AND id = ?";
        assert_eq!(
            rewrite(sql, Dialect::Postgres),
            "SELECT * FROM t WHERE note = 'a?b' AND id = $1"
        );
    }
}
