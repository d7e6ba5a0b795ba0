//! # Database Error Types
//!
//! Error types for repository and unit-of-work operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  QueryError (translator)   CoreError (entity)   sqlx::Error (SQLite)   │
//! │       │                         │                     │                 │
//! │       └─────────────────────────┼─────────────────────┘                 │
//! │                                 ▼                                       │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (seed binary, application code)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups that find nothing return `Ok(None)` or an empty `Vec`. `NotFound`
//! is reserved for writes aimed at a row that does not exist.

use roster_core::CoreError;
use thiserror::Error;

use crate::query::QueryError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A repository query could not be set up.
    ///
    /// ## When This Occurs
    /// - `derived("findByUsernameAndAgeGreaterThen")` on build
    /// - Explicit SQL with a malformed placeholder
    ///
    /// Fatal: the repository is never handed out.
    #[error("Invalid query '{operation}': {source}")]
    Configuration {
        operation: String,
        #[source]
        source: QueryError,
    },

    /// A single-result query matched more than one row.
    #[error("Query '{operation}' expected at most one result but found {count}")]
    NonUniqueResult { operation: String, count: usize },

    /// A write aimed at a row that does not exist.
    ///
    /// ## When This Occurs
    /// - `delete_by_id` with an unknown id
    /// - Saving a detached entity whose row was deleted
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving a member that points at a missing team
    /// - Deleting a team that still has members
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - Explicit SQL referencing an unknown table or column
    /// - CHECK constraint failures
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// Translation or binding error at run time.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A row that does not map back onto its entity.
    #[error("Mapping error: {0}")]
    Mapping(#[from] CoreError),

    /// Invalid configuration file or environment.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Wraps a translator error raised while registering `operation`.
    pub fn configuration(operation: impl Into<String>, source: QueryError) -> Self {
        DbError::Configuration {
            operation: operation.into(),
            source,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
///
/// `RowNotFound` never reaches here: lookups use `fetch_optional`.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnNotFound(column) => {
                DbError::QueryFailed(format!("column '{}' missing from result", column))
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
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
    fn test_configuration_message() {
        let err = DbError::configuration(
            "findByUsernameAndAgeGreaterThen",
            QueryError::NoProperty {
                property: "greaterThen".to_string(),
                entity: "Member.age".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Invalid query 'findByUsernameAndAgeGreaterThen': \
             No property 'greaterThen' found for type 'Member.age'"
        );
    }

    #[test]
    fn test_non_unique_message() {
        let err = DbError::NonUniqueResult {
            operation: "findMemberByUsername".to_string(),
            count: 2,
        };
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
    }
}
