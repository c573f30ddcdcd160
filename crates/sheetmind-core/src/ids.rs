//! Opaque identifiers shared across the runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session identifier.
///
/// Sessions are created with a random v4 UUID rendered as a plain string;
/// the type itself is just a newtype so call sites can't accidentally pass
/// a user id where a session id is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing string as a session id (used when resuming a
    /// session loaded from storage).
    #[must_use]
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A user identity bound to a request.
///
/// Per spec, `user_id` is either an opaque authenticated identifier or the
/// anonymous sentinel. Anonymous users have no `db_user_id`: every
/// user-scoped query appends `user_id IS NULL` rather than binding a
/// value, so anonymous data is shared across anonymous requests rather
/// than siloed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserId {
    /// An authenticated, opaque user identifier.
    Authenticated(String),
    /// The anonymous sentinel — no identity, no per-user isolation.
    Anonymous,
}

impl UserId {
    /// `true` if this is the anonymous sentinel.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// The opaque id string, or `None` for the anonymous sentinel.
    #[must_use]
    pub fn as_db_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated(id) => Some(id.as_str()),
            Self::Anonymous => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "{id}"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_json() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn anonymous_user_has_no_db_id() {
        assert_eq!(UserId::Anonymous.as_db_id(), None);
        assert!(UserId::Anonymous.is_anonymous());
        assert_eq!(
            UserId::Authenticated("u1".to_string()).as_db_id(),
            Some("u1")
        );
    }
}
