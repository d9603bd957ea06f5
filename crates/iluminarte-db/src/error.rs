//! # Database Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (ledger, validation)    │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────── DbError::Domain                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Request boundary shows the message, nothing was committed             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use iluminarte_core::{CoreError, Entity, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A UNIQUE index fired that no repository translated into a
    /// domain error.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A sale or line pointed at a row that is gone, or a delete hit
    /// `ON DELETE RESTRICT`.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database file could not be opened, or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other SQLite or driver failure.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// SQLite reported the database busy or locked after the busy timeout.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// No pooled connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Hashing or parsing a password hash failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// `Domain(NotFound)` for `entity` with `id`.
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        DbError::Domain(CoreError::not_found(entity, id))
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the operation may succeed if run again from the start.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// SQLite reports constraint and lock failures only through the message
/// text:
///
/// ```text
/// UNIQUE constraint failed: products.code   → UniqueViolation { field: "products.code" }
/// FOREIGN KEY constraint failed             → ForeignKeyViolation
/// database is locked / database table is locked / database is busy → Busy
/// anything else from the database           → QueryFailed
/// PoolTimedOut                              → PoolExhausted
/// PoolClosed                                → ConnectionFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => classify(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

fn classify(msg: &str) -> DbError {
    if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::duplicate(columns, "unknown");
    }
    if msg.starts_with("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: msg.to_string(),
        };
    }
    if msg.contains("is locked") || msg.contains("database is busy") {
        return DbError::Busy(msg.to_string());
    }
    DbError::QueryFailed(msg.to_string())
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for DbError {
    fn from(err: argon2::password_hash::Error) -> Self {
        DbError::PasswordHash(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_pass_through() {
        let err: DbError = CoreError::EmptySale.into();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptySale));
        assert_eq!(err.to_string(), CoreError::EmptySale.to_string());
    }

    #[test]
    fn test_not_found_is_domain() {
        let err = DbError::not_found(Entity::Product, "p1");
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotFound {
                entity: Entity::Product,
                ..
            })
        ));
        assert!(!err.is_busy());
    }

    #[test]
    fn test_validation_converts() {
        let err: DbError = ValidationError::Negative {
            field: "stock".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[test]
    fn test_classify_sqlite_messages() {
        assert!(matches!(
            classify("UNIQUE constraint failed: products.code"),
            DbError::UniqueViolation { ref field, .. } if field == "products.code"
        ));
        assert!(matches!(
            classify("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(classify("database is locked").is_busy());
        assert!(classify("database table is locked: sales").is_busy());
        assert!(matches!(
            classify("no such table: widgets"),
            DbError::QueryFailed(_)
        ));
    }
}
