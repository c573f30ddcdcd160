//! Shared `user_id` scoping clause used by every user-owned table.
//!
//! Anonymous scope matches rows where `user_id IS NULL`; an authenticated
//! scope matches `user_id = ?` bound to the user's id. Every store builds
//! its `WHERE` clauses through [`UserFilter`] so the branching is written
//! exactly once.

use sheetmind_core::UserId;
use sheetmind_db::Param;

/// A fragment of SQL plus the params it binds, for filtering a query by
/// the caller's user scope.
pub struct UserFilter {
    /// `"user_id IS NULL"` or `"user_id = ?"`.
    pub clause: &'static str,
    /// Zero or one bind params, matching `clause`.
    pub params: Vec<Param>,
}

impl UserFilter {
    /// Build the filter for the given optional user id.
    #[must_use]
    pub fn for_user(user_id: Option<&UserId>) -> Self {
        match user_id.and_then(UserId::as_db_id) {
            Some(id) => Self {
                clause: "user_id = ?",
                params: vec![Param::text(id)],
            },
            None => Self {
                clause: "user_id IS NULL",
                params: vec![],
            },
        }
    }

    /// The bind value to store alongside a new row (`NULL` for anonymous).
    #[must_use]
    pub fn bind_value(user_id: Option<&UserId>) -> Param {
        match user_id.and_then(UserId::as_db_id) {
            Some(id) => Param::text(id),
            None => Param::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_filters_on_null() {
        let f = UserFilter::for_user(Some(&UserId::Anonymous));
        assert_eq!(f.clause, "user_id IS NULL");
        assert!(f.params.is_empty());
    }

    #[test]
    fn authenticated_filters_on_id() {
        let user = UserId::Authenticated("alice".into());
        let f = UserFilter::for_user(Some(&user));
        assert_eq!(f.clause, "user_id = ?");
        assert_eq!(f.params, vec![Param::text("alice")]);
    }
}
