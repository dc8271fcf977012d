//! # Database Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (talad-engine) ← NotFound kept, the rest become Storage   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Envelope {status: "fail", code, message}                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Failures raised by the promotion store, catalog and audit log.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Duplicate promotion id, product id or SKU.
    #[error("Duplicate value violates {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK or NOT NULL rejection.
    ///
    /// Raised when an update would leave `usage_count` above
    /// `usage_limit`, or a negative price reaches the table.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// A stored row that no longer decodes, e.g. hand-edited JSON in a
    /// scope or rule column.
    #[error("Malformed {entity} record {id}: {reason}")]
    MalformedRecord {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// A row that was read but could not become a domain value.
    pub fn malformed(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        DbError::MalformedRecord {
            entity: entity.into(),
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the constraint family (unique, foreign key, check).
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::CheckViolation { .. }
        )
    }
}

/// ```text
/// RowNotFound        → NotFound("Record", "unknown")
/// Database(kind)     → UniqueViolation / ForeignKeyViolation / CheckViolation
///                      QueryFailed for anything else SQLite reports
/// PoolTimedOut       → PoolExhausted
/// PoolClosed         → ConnectionFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::RowNotFound => return DbError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => return DbError::PoolExhausted,
            sqlx::Error::PoolClosed => return DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Database(db_err) => db_err,
            other => return DbError::Internal(other.to_string()),
        };

        let message = db_err.message().to_string();
        match db_err.kind() {
            ErrorKind::UniqueViolation => DbError::UniqueViolation {
                // SQLite names the columns: "UNIQUE constraint failed: products.sku"
                constraint: message
                    .rsplit_once(": ")
                    .map(|(_, columns)| columns.to_string())
                    .unwrap_or(message),
            },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
            ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                DbError::CheckViolation { message }
            }
            _ => DbError::QueryFailed(message),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("JSON encoding failed: {}", err))
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_classified() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(DbError::from(sqlx::Error::PoolClosed), DbError::ConnectionFailed(_)));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound { ref entity, .. } if entity == "Record"
        ));
    }

    #[test]
    fn test_constraint_family() {
        assert!(DbError::UniqueViolation { constraint: "products.sku".into() }.is_constraint());
        assert!(DbError::CheckViolation { message: "usage".into() }.is_constraint());
        assert!(!DbError::PoolExhausted.is_constraint());
        assert!(!DbError::not_found("Promotion", "p-1").is_constraint());
    }
}
