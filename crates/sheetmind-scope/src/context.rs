//! The immutable per-request identity.

use std::path::{Path, PathBuf};

use sheetmind_core::UserId;

use crate::error::{ScopeError, ScopeResult};

/// A user's role within a request. Kept as an opaque string rather than
/// a closed enum: roles are a deployment concern, not a runtime one.
pub type Role = String;

/// The identity and workspace a request runs under. Immutable once
/// constructed; lives for the duration of the request.
#[derive(Debug, Clone)]
pub struct UserContext {
    user_id: UserId,
    role: Role,
    workspace_root: PathBuf,
}

impl UserContext {
    /// Build a context, verifying `workspace_root` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::WorkspaceRootMissing`] if the path does not
    /// exist or is not a directory.
    pub fn new(user_id: UserId, role: impl Into<Role>, workspace_root: impl AsRef<Path>) -> ScopeResult<Self> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        if !workspace_root.is_dir() {
            return Err(ScopeError::WorkspaceRootMissing(workspace_root.display().to_string()));
        }
        Ok(Self {
            user_id,
            role: role.into(),
            workspace_root,
        })
    }

    /// The request's user identity.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The request's role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The workspace root this request is scoped to.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// `true` if this context has no authenticated identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_workspace_root() {
        let result = UserContext::new(UserId::Anonymous, "viewer", "/does/not/exist/sheetmind");
        assert!(matches!(result, Err(ScopeError::WorkspaceRootMissing(_))));
    }

    #[test]
    fn accepts_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = UserContext::new(UserId::Anonymous, "viewer", dir.path()).unwrap();
        assert!(ctx.is_anonymous());
    }
}
