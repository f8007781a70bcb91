//! Database error types for evlog-db.

use evlog_core::errors::StoreError;
use thiserror::Error;

/// Errors from libSQL store operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Installing the event-log tables failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A boundary-level failure (unknown table, relation, hook error).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Store(inner) => inner,
            DatabaseError::InvalidState(msg) => Self::InvalidState(msg),
            DatabaseError::Other(inner) => Self::Other(inner),
            DatabaseError::Query(msg) | DatabaseError::Migration(msg) => Self::Query(msg),
            other @ (DatabaseError::NoResult | DatabaseError::LibSql(_)) => {
                Self::Query(other.to_string())
            }
        }
    }
}
