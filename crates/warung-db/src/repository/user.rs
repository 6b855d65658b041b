//! # User Repository
//!
//! Accounts and credential checks.
//!
//! ## Username Matching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stored username     "Admin123 "   (kept exactly as typed)              │
//! │  stored usernameNorm "admin123"    (trim + lowercase, unique)           │
//! │                                                                         │
//! │  login("admin123")  ─► normalize ─► usernameNorm = "admin123" ─► match │
//! │  login(" ADMIN123") ─► normalize ─► usernameNorm = "admin123" ─► match │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Passwords are stored and compared as plain text, matching the shop's
//! existing data. They are never returned from this module.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use crate::store::{self, Query};
use warung_core::validation::{validate_new_user, validate_user_patch};
use warung_core::{normalize_username, NewUser, User, UserPatch};

#[derive(Debug, Clone)]
pub struct UserRepository {
    coordinator: Coordinator,
}

/// Inserts an account on an open connection. Returns the new id.
pub(crate) async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> DbResult<i64> {
    let norm = normalize_username(&user.username);

    let id = sqlx::query(
        r#"
        INSERT INTO users (username, username_norm, password, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&norm)
    .bind(&user.password)
    .bind(user.role)
    .bind(Utc::now())
    .execute(conn)
    .await
    .map_err(|e| {
        DbError::from(e).with_conflict(&[
            ("username", user.username.as_str()),
            ("username_norm", norm.as_str()),
        ])
    })?
    .last_insert_rowid();

    Ok(id)
}

/// Looks up an account by normalized username on an open connection.
pub(crate) async fn find_by_norm(conn: &mut SqliteConnection, norm: &str) -> DbResult<Option<User>> {
    let mut hits: Vec<User> = store::query(conn, &Query::on("usernameNorm").equals(norm)).await?;
    Ok(hits.pop())
}

impl UserRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        UserRepository { coordinator }
    }

    /// Creates an account.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Username taken, compared after
    ///   trimming and lowercasing
    pub async fn add(&self, user: &NewUser) -> DbResult<User> {
        validate_new_user(user)?;
        debug!(username = %user.username, "Inserting user");

        let mut uow = self.coordinator.begin(&[Collection::Users]).await?;
        let id = insert_user(&mut uow, user).await?;
        let stored = store::get::<User, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;
        uow.commit().await?;

        Ok(stored)
    }

    pub async fn get(&self, id: i64) -> DbResult<User> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<User>> {
        store::get(self.coordinator.pool(), id).await
    }

    /// Finds an account by username, ignoring case and surrounding spaces.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let norm = normalize_username(username);
        let mut hits: Vec<User> = store::query(
            self.coordinator.pool(),
            &Query::on("usernameNorm").equals(norm),
        )
        .await?;
        Ok(hits.pop())
    }

    /// Checks a username/password pair.
    ///
    /// ## Errors
    /// * `DbError::InvalidCredentials` - Unknown user or wrong password
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<User> {
        let norm = normalize_username(username);

        let stored: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE username_norm = ?")
                .bind(&norm)
                .fetch_optional(self.coordinator.pool())
                .await?;

        match stored {
            Some((id, stored_password)) if stored_password == password => self.get(id).await,
            _ => Err(DbError::InvalidCredentials),
        }
    }

    /// Applies a partial update. A blank password in the patch means
    /// "keep the current one".
    pub async fn update(&self, id: i64, patch: &UserPatch) -> DbResult<User> {
        let mut patch = patch.clone();
        if patch.password.as_deref() == Some("") {
            patch.password = None;
        }
        validate_user_patch(&patch)?;
        debug!(id, "Updating user");

        let mut uow = self.coordinator.begin(&[Collection::Users]).await?;
        let current = store::get::<User, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        let username = patch.username.clone().unwrap_or(current.username);
        let norm = normalize_username(&username);

        sqlx::query(
            r#"
            UPDATE users SET
                username = ?,
                username_norm = ?,
                password = COALESCE(?, password),
                role = ?
            WHERE id = ?
            "#,
        )
        .bind(&username)
        .bind(&norm)
        .bind(&patch.password)
        .bind(patch.role.unwrap_or(current.role))
        .bind(id)
        .execute(&mut *uow)
        .await
        .map_err(|e| {
            DbError::from(e).with_conflict(&[
                ("username", username.as_str()),
                ("username_norm", norm.as_str()),
            ])
        })?;

        let updated = store::get::<User, _>(&mut *uow, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;
        uow.commit().await?;

        Ok(updated)
    }

    /// Deletes an account.
    ///
    /// `acting_user_id` is the signed-in account; it cannot delete itself.
    pub async fn delete(&self, id: i64, acting_user_id: Option<i64>) -> DbResult<()> {
        if acting_user_id == Some(id) {
            return Err(DbError::DeleteBlocked {
                entity: "User".to_string(),
                id: id.to_string(),
                reason: "cannot delete the signed-in account".to_string(),
            });
        }
        debug!(id, "Deleting user");

        let mut uow = self.coordinator.begin(&[Collection::Users]).await?;
        if !store::delete(&mut *uow, Collection::Users, id).await? {
            return Err(DbError::not_found("User", id));
        }
        uow.commit().await
    }

    /// Every account, by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        store::query(self.coordinator.pool(), &Query::on("username")).await
    }

    /// Accounts whose username starts with `term`, ignoring case.
    pub async fn search(&self, term: &str) -> DbResult<Vec<User>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }
        store::query(
            self.coordinator.pool(),
            &Query::on("username").starts_with_ignore_case(term),
        )
        .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        store::count(self.coordinator.pool(), Collection::Users).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
