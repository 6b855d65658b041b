//! # Session State
//!
//! The signed-in user for this process, persisted so a restart keeps the
//! cashier logged in.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  startup ──► restore() ──► session file? ──no──► signed out             │
//! │                                │                                        │
//! │                               yes                                       │
//! │                                ▼                                        │
//! │               user still exists with same username?                     │
//! │                   │                          │                          │
//! │                  yes                         no                         │
//! │                   ▼                          ▼                          │
//! │              signed in             file removed, signed out             │
//! │                                                                         │
//! │  login()  ──► authenticate ──► state + file written                     │
//! │  logout() ──► state cleared ──► file removed                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The file holds only the user id and username. Passwords never leave
//! the users table.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::UserRepository;
use warung_core::{normalize_username, User};

// =============================================================================
// Session File
// =============================================================================

/// What is written to disk for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user_id: i64,
    pub username: String,
    pub signed_in_at: DateTime<Utc>,
}

/// JSON session file, normally stored beside the database file.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionFile { path: path.into() }
    }

    /// `shop.db` ──► `shop.session.json` in the same directory.
    pub fn beside(database_path: &Path) -> Self {
        SessionFile::new(database_path.with_extension("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing file is `Ok(None)`.
    pub async fn load(&self) -> DbResult<Option<StoredSession>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DbError::Session(e.to_string())),
        };
        let session = serde_json::from_slice(&bytes)
            .map_err(|e| DbError::Session(format!("{}: {e}", self.path.display())))?;
        Ok(Some(session))
    }

    pub async fn save(&self, session: &StoredSession) -> DbResult<()> {
        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| DbError::Session(e.to_string()))
    }

    /// Removes the file. Already gone is fine.
    pub async fn clear(&self) -> DbResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::Session(e.to_string())),
        }
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Process-wide current user.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct SessionManager {
    users: UserRepository,
    file: Option<SessionFile>,
    current: Arc<RwLock<Option<User>>>,
}

impl SessionManager {
    /// `file` is `None` for databases that should not outlive the process.
    pub fn new(users: UserRepository, file: Option<SessionFile>) -> Self {
        SessionManager {
            users,
            file,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Signs in by username (case and surrounding spaces ignored) and exact
    /// password.
    ///
    /// ## Returns
    /// * `Ok(User)` - The account, without its password
    /// * `Err(DbError::InvalidCredentials)` - Unknown user or wrong password
    pub async fn login(&self, username: &str, password: &str) -> DbResult<User> {
        let user = self.users.authenticate(username, password).await?;

        if let Some(file) = &self.file {
            file.save(&StoredSession {
                user_id: user.id,
                username: user.username.clone(),
                signed_in_at: Utc::now(),
            })
            .await?;
        }
        *self.current.write().await = Some(user.clone());

        info!(user_id = user.id, role = user.role.as_str(), "User signed in");
        Ok(user)
    }

    /// Loads the persisted session, if any, and checks it against the
    /// users table.
    ///
    /// A session whose user was deleted or renamed is discarded.
    pub async fn restore(&self) -> DbResult<Option<User>> {
        let Some(file) = &self.file else {
            return Ok(self.current().await);
        };
        let Some(stored) = file.load().await? else {
            *self.current.write().await = None;
            return Ok(None);
        };

        let user = self
            .users
            .find(stored.user_id)
            .await?
            .filter(|u| u.username_norm == normalize_username(&stored.username));

        match user {
            Some(user) => {
                debug!(user_id = user.id, "Session restored");
                *self.current.write().await = Some(user.clone());
                Ok(Some(user))
            }
            None => {
                warn!(
                    user_id = stored.user_id,
                    username = %stored.username,
                    "Stored session refers to a missing user, discarding"
                );
                file.clear().await?;
                *self.current.write().await = None;
                Ok(None)
            }
        }
    }

    pub async fn logout(&self) -> DbResult<()> {
        let previous = self.current.write().await.take();
        if let Some(file) = &self.file {
            file.clear().await?;
        }
        if let Some(user) = previous {
            info!(user_id = user.id, "User signed out");
        }
        Ok(())
    }

    /// The signed-in user, if any.
    pub async fn current(&self) -> Option<User> {
        self.current.read().await.clone()
    }

    /// Deletes an account on behalf of the signed-in user, who cannot
    /// delete themself.
    pub async fn delete_user(&self, id: i64) -> DbResult<()> {
        let acting = self.current().await.map(|u| u.id);
        self.users.delete(id, acting).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;
    use warung_core::{NewUser, Role};

    fn temp_session_file() -> SessionFile {
        let path = std::env::temp_dir().join(format!("warung-session-{}.json", Uuid::new_v4()));
        SessionFile::new(path)
    }

    #[test]
    fn test_session_file_beside_database() {
        let file = SessionFile::beside(Path::new("/data/warung.db"));
        assert_eq!(file.path(), Path::new("/data/warung.session.json"));
    }

    #[tokio::test]
    async fn test_session_file_roundtrip() {
        let file = temp_session_file();
        assert_eq!(file.load().await.unwrap(), None);

        let stored = StoredSession {
            user_id: 7,
            username: "kasir123".to_string(),
            signed_in_at: Utc::now(),
        };
        file.save(&stored).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(stored));

        file.clear().await.unwrap();
        file.clear().await.unwrap();
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_restore_logout() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let file = temp_session_file();
        let session = SessionManager::new(db.users(), Some(file.clone()));

        let user = session.login(" Admin123", "admin123").await.unwrap();
        assert_eq!(user.username, "admin123");
        assert_eq!(session.current().await.map(|u| u.id), Some(user.id));

        // A fresh process sees the persisted session.
        let restarted = SessionManager::new(db.users(), Some(file.clone()));
        let restored = restarted.restore().await.unwrap();
        assert_eq!(restored.map(|u| u.id), Some(user.id));

        restarted.logout().await.unwrap();
        assert!(restarted.current().await.is_none());
        assert_eq!(file.load().await.unwrap(), None);

        assert!(matches!(
            session.login("admin123", "wrong").await,
            Err(DbError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_restore_discards_deleted_user() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        let temp = db
            .users()
            .add(&NewUser {
                username: "sementara".to_string(),
                password: "secret1".to_string(),
                role: Role::Cashier,
            })
            .await
            .unwrap();

        let file = temp_session_file();
        let session = SessionManager::new(db.users(), Some(file.clone()));
        session.login("sementara", "secret1").await.unwrap();

        db.users().delete(temp.id, None).await.unwrap();

        let restarted = SessionManager::new(db.users(), Some(file.clone()));
        assert_eq!(restarted.restore().await.unwrap(), None);
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_signed_in_user_cannot_delete_self() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = SessionManager::new(db.users(), None);
        let admin = session.login("admin123", "admin123").await.unwrap();
        let kasir = db.users().find_by_username("kasir123").await.unwrap().unwrap();

        assert!(matches!(
            session.delete_user(admin.id).await,
            Err(DbError::DeleteBlocked { .. })
        ));
        session.delete_user(kasir.id).await.unwrap();
        assert_eq!(db.users().count().await.unwrap(), 1);
    }
}
