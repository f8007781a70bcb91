//! Engine error types.

use evlog_core::errors::StoreError;
use thiserror::Error;

/// Errors from configuration loading, hook handling, and manual events.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The database is missing a table the engine needs. Fatal, not retried.
    #[error("Failed to load the event log configuration of database '{database}': {message}")]
    Configuration { database: String, message: String },

    /// A group targets an entity that is not monitored in the same database.
    #[error("Group '{group}' in database '{database}' targets unknown entity id {target_store_id}")]
    Resolution {
        database: String,
        group: String,
        target_store_id: i64,
    },

    /// Manual events require the database's configuration to be loaded.
    #[error("Database '{0}' is not registered for event logging")]
    NotRegistered(String),

    /// A row read from an event-log table has an unexpected shape.
    #[error("Invalid row in {table}: {message}")]
    InvalidRow { table: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventLogError {
    /// Whether this error must stop a reload instead of being logged.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Resolution { .. })
    }

    pub(crate) fn invalid_row(table: &str, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            table: table.to_string(),
            message: message.into(),
        }
    }
}
