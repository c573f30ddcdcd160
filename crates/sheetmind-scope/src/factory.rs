//! Builds a [`UserScope`] for a [`UserContext`], deciding whether the
//! scope gets a dedicated connection or shares the instance-wide one.

use std::path::PathBuf;
use std::sync::Arc;

use sheetmind_db::{migrate, Database, Dialect};
use tracing::debug;

use crate::context::UserContext;
use crate::error::ScopeResult;

/// How a [`UserScope`]'s database handle was obtained.
enum Connection {
    /// A dedicated per-user SQLite file this scope is responsible for
    /// closing.
    Owned(Database),
    /// The instance-wide pool, shared across requests (Postgres, or an
    /// anonymous SQLite caller).
    Shared(Arc<Database>),
}

/// Builds scopes against either a shared Postgres pool or a directory of
/// per-user SQLite files.
pub enum ScopeFactory {
    /// Every scope shares this connection (Postgres deployments, or
    /// SQLite deployments that intentionally pool all users together).
    Shared(Arc<Database>),
    /// Authenticated users each get their own SQLite file under this
    /// directory; anonymous users share `fallback`.
    PerUserSqlite {
        /// Directory holding `<user_id>.sqlite3` files.
        dir: PathBuf,
        /// Shared connection used for anonymous requests.
        fallback: Arc<Database>,
    },
}

impl ScopeFactory {
    /// Build a [`UserScope`] for `context`, migrating a freshly-opened
    /// per-user database before handing it back.
    ///
    /// # Errors
    ///
    /// Returns an error if a per-user SQLite file fails to open or
    /// migrate.
    pub async fn scope_for(&self, context: UserContext) -> ScopeResult<UserScope> {
        let connection = match self {
            Self::Shared(db) => Connection::Shared(Arc::clone(db)),
            Self::PerUserSqlite { dir, fallback } => match context.user_id().as_db_id() {
                Some(user_id) if fallback.dialect() == Dialect::Sqlite => {
                    let path = dir.join(format!("{user_id}.sqlite3"));
                    debug!(%user_id, path = %path.display(), "opening per-user database");
                    let db = Database::connect_sqlite(&path.display().to_string()).await?;
                    migrate(&db).await?;
                    Connection::Owned(db)
                },
                _ => Connection::Shared(Arc::clone(fallback)),
            },
        };
        Ok(UserScope { context, connection })
    }
}

/// A request-scoped handle: the user's identity plus the database
/// connection it's allowed to use.
pub struct UserScope {
    context: UserContext,
    connection: Connection,
}

impl UserScope {
    /// The identity this scope was built for.
    #[must_use]
    pub fn context(&self) -> &UserContext {
        &self.context
    }

    /// Borrow the scope's database connection.
    #[must_use]
    pub fn db(&self) -> &Database {
        match &self.connection {
            Connection::Owned(db) => db,
            Connection::Shared(db) => db,
        }
    }

    /// `true` if this scope owns a dedicated connection that must be
    /// closed when the request ends.
    #[must_use]
    pub fn owns_connection(&self) -> bool {
        matches!(self.connection, Connection::Owned(_))
    }

    /// Release the scope's connection. A no-op for shared connections —
    /// only an owned per-user SQLite file is actually closed.
    pub async fn close(self) {
        if let Connection::Owned(db) = self.connection {
            db.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmind_core::UserId;

    async fn shared_fallback() -> Arc<Database> {
        let db = Database::connect_sqlite_memory().await.unwrap();
        migrate(&db).await.unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn anonymous_shares_fallback_connection() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ScopeFactory::PerUserSqlite {
            dir: dir.path().to_path_buf(),
            fallback: shared_fallback().await,
        };
        let workspace = tempfile::tempdir().unwrap();
        let context = UserContext::new(UserId::Anonymous, "viewer", workspace.path()).unwrap();
        let scope = factory.scope_for(context).await.unwrap();
        assert!(!scope.owns_connection());
        scope.close().await;
    }

    #[tokio::test]
    async fn authenticated_sqlite_user_owns_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ScopeFactory::PerUserSqlite {
            dir: dir.path().to_path_buf(),
            fallback: shared_fallback().await,
        };
        let workspace = tempfile::tempdir().unwrap();
        let context = UserContext::new(UserId::Authenticated("alice".into()), "editor", workspace.path()).unwrap();
        let scope = factory.scope_for(context).await.unwrap();
        assert!(scope.owns_connection());
        assert!(dir.path().join("alice.sqlite3").exists());
        scope.close().await;
    }

    #[tokio::test]
    async fn shared_factory_never_owns_a_connection() {
        let factory = ScopeFactory::Shared(shared_fallback().await);
        let workspace = tempfile::tempdir().unwrap();
        let context = UserContext::new(UserId::Authenticated("bob".into()), "editor", workspace.path()).unwrap();
        let scope = factory.scope_for(context).await.unwrap();
        assert!(!scope.owns_connection());
    }
}
