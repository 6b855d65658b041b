//! # Database Error Types
//!
//! Error types for data layer operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError (warung-core)        SQLite error (sqlx::Error)        │
//! │       │   rejected before any write        │                            │
//! │       ▼                                    ▼                            │
//! │  DbError (this module) ← entity, field and conflicting value attached   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Presentation layer renders a user-facing message                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use warung_core::ValidationError;

/// Data layer errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Caller input violated a precondition. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced record does not exist.
    ///
    /// ## When This Occurs
    /// - `get`/`update`/`delete` with an unknown id
    /// - A sale line or goods receipt line naming a missing product
    /// - A sale attached to a missing customer, a receipt to a missing supplier
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique index collision.
    ///
    /// ## When This Occurs
    /// - Duplicate product code, member number or username
    /// - Receipt number collision (caller may retry)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A sale would drive stock below zero.
    ///
    /// ## When This Occurs
    /// Stock is re-read inside the sale transaction, so a cart that was
    /// valid when built can still fail here if another sale got there first.
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        code: String,
        available: i64,
        requested: i64,
    },

    /// Delete refused because other records depend on the target.
    ///
    /// ## When This Occurs
    /// - Customer with recorded sales
    /// - The signed-in user deleting their own account
    #[error("Cannot delete {entity} {id}: {reason}")]
    DeleteBlocked {
        entity: String,
        id: String,
        reason: String,
    },

    /// Login rejected. Deliberately does not say which part was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Query names an index the schema does not declare.
    #[error("Unknown index '{index}' on {collection}")]
    UnknownIndex { collection: String, index: String },

    /// Stored schema is newer than this build understands.
    #[error("Database schema version {found} is newer than supported version {latest}")]
    UnsupportedVersion { found: i64, latest: i64 },

    /// A migration step failed; earlier steps stay applied.
    #[error("Migration to version {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    /// Storage medium unavailable (cannot open, disk full, corrupt, pool closed).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Session file could not be read or written.
    #[error("Session storage failed: {0}")]
    Session(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Fills in the conflicting value of a UniqueViolation raised by SQLite,
    /// which only reports `table.column`.
    ///
    /// `values` maps column names to the values the caller tried to write.
    pub fn with_conflict(self, values: &[(&str, &str)]) -> Self {
        match self {
            DbError::UniqueViolation { field, .. } => {
                let column = field.rsplit('.').next().unwrap_or(field.as_str());
                let value = values
                    .iter()
                    .find(|(c, _)| *c == column)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                DbError::UniqueViolation { field, value }
            }
            other => other,
        }
    }

    /// Whether this is a unique index collision.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound           → DbError::NotFound
/// "UNIQUE constraint failed: t.c"    → DbError::UniqueViolation { field: "t.c" }
/// SQLITE_FULL / CORRUPT / CANTOPEN   → DbError::StorageUnavailable
/// sqlx::Error::PoolClosed / Io       → DbError::StorageUnavailable
/// Other                              → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    // Composite indexes report "t.a, t.b"; keep the first column.
                    let field = field.split(',').next().unwrap_or(field).trim();
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("database or disk is full")
                    || msg.contains("malformed")
                    || msg.contains("unable to open")
                    || msg.contains("not a database")
                {
                    DbError::StorageUnavailable(msg.to_string())
                } else {
                    DbError::Internal(msg.to_string())
                }
            }

            sqlx::Error::PoolClosed => DbError::StorageUnavailable("Pool is closed".to_string()),
            sqlx::Error::PoolTimedOut => {
                DbError::StorageUnavailable("Timed out waiting for a connection".to_string())
            }
            sqlx::Error::Io(e) => DbError::StorageUnavailable(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("JSON encoding failed: {}", err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_conflict_fills_value() {
        let err = DbError::UniqueViolation {
            field: "products.code".to_string(),
            value: "unknown".to_string(),
        }
        .with_conflict(&[("code", "P001"), ("name", "Kopi Hitam")]);

        assert_eq!(err.to_string(), "Duplicate products.code: 'P001' already exists");
    }

    #[test]
    fn test_with_conflict_leaves_other_errors() {
        let err = DbError::not_found("Product", 9).with_conflict(&[("code", "P001")]);
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_validation_converts() {
        let err: DbError = ValidationError::EmptyCart.into();
        assert_eq!(err.to_string(), "Validation failed: Cart is empty");
    }
}
