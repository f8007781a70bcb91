//! Event-log table installation.
//!
//! Embeds the SQL template at compile time. Host applications normally own
//! their schema; this exists for new deployments and for tests.

use evlog_core::tables::TableNames;

use crate::error::DatabaseError;

const MIGRATION_001: &str = include_str!("../migrations/001_event_log.sql");

/// The installation script for tables named with `prefix`.
#[must_use]
pub fn event_log_script(names: &TableNames) -> String {
    MIGRATION_001.replace("{prefix}", &names.log)
}

/// Create the event-log tables if they do not exist.
pub(crate) async fn install(
    conn: &libsql::Connection,
    names: &TableNames,
) -> Result<(), DatabaseError> {
    conn.execute_batch(&event_log_script(names))
        .await
        .map_err(|e| DatabaseError::Migration(format!("001_event_log: {e}")))?;
    Ok(())
}
