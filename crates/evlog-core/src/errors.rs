//! Error types raised at the store boundary.
//!
//! Engine-specific errors (`EventLogError`) and adapter-specific errors
//! (`DatabaseError`) live in their respective crates. Everything that crosses
//! the `Store` / `Transaction` traits is expressed as a `StoreError`.

use thiserror::Error;

/// Errors returned by a backing store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query or write failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// The logical database is not known to the store.
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// The table does not exist in the logical database.
    #[error("Unknown table: {database}.{table}")]
    UnknownTable { database: String, table: String },

    /// No relation with this accessor name exists on the table.
    #[error("Unknown relation '{relation}' on table {table}")]
    UnknownRelation { table: String, relation: String },

    /// More than one derived relation answers to this accessor name.
    #[error("Ambiguous relation '{relation}' on table {table} ({candidates} candidates)")]
    AmbiguousRelation {
        table: String,
        relation: String,
        candidates: usize,
    },

    /// The table has no primary key, so its records cannot be addressed.
    #[error("Table {0} has no primary key")]
    NoPrimaryKey(String),

    /// Invalid state encountered (e.g., a finished transaction reused).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A lifecycle extension failed while handling a mutation.
    #[error("Extension '{extension}' failed: {error}")]
    Hook {
        extension: String,
        error: anyhow::Error,
    },

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
