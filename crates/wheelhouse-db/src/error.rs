//! Error types for wheelhouse-db.

use diesel::result::DatabaseErrorKind;
use miette::Diagnostic;
use thiserror::Error;

/// Database error type for registry store operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(wheelhouse_db::connection),
        help("Check if the database file exists and is accessible")
    )]
    ConnectionError(String),

    #[error("Database query failed: {0}")]
    #[diagnostic(code(wheelhouse_db::query))]
    QueryError(String),

    #[error("Record not found: {0}")]
    #[diagnostic(code(wheelhouse_db::not_found))]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    #[diagnostic(
        code(wheelhouse_db::conflict),
        help("Another request registered the same record concurrently; retry the operation")
    )]
    Conflict(String),

    #[error("Database integrity error: {0}")]
    #[diagnostic(
        code(wheelhouse_db::integrity),
        help("The registry database may be corrupted")
    )]
    IntegrityError(String),
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => DbError::NotFound("Record not found".to_string()),
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DbError::Conflict(info.message().to_string())
            }
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation | DatabaseErrorKind::NotNullViolation,
                info,
            ) => DbError::IntegrityError(info.message().to_string()),
            diesel::result::Error::DatabaseError(_, info) => {
                DbError::QueryError(info.message().to_string())
            }
            other => DbError::QueryError(other.to_string()),
        }
    }
}

impl From<diesel::result::ConnectionError> for DbError {
    fn from(err: diesel::result::ConnectionError) -> Self {
        DbError::ConnectionError(err.to_string())
    }
}

/// Result type alias for wheelhouse-db operations.
pub type Result<T> = std::result::Result<T, DbError>;
