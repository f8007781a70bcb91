//! Manually injected events.
//!
//! For changes no lifecycle hook sees (imports, external systems, batch
//! jobs). An event is written as exactly one log entry in its own
//! transaction and never cascades.

use chrono::Utc;
use evlog_core::affected::AffectedKey;
use evlog_core::entities::{LogData, LogRecord, SourceEntity};
use evlog_core::store::{Store, Transaction};
use evlog_core::tables::TableNames;

use crate::error::EventLogError;
use crate::writer::LogWriter;

/// What to record for a manual event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Free-form field names.
    pub fields: Vec<String>,
    /// Name of the entity the event originated from.
    pub source_entity: Option<String>,
    /// Path the event travelled; only stored together with `source_entity`.
    pub via: Option<String>,
    pub user_id: Option<i64>,
    pub id: Option<i64>,
    pub secondary_id: Option<i64>,
    pub string_id: Option<String>,
}

impl EventOptions {
    fn source(&self) -> Option<SourceEntity> {
        self.source_entity.as_ref().map(|name| SourceEntity {
            name: name.clone(),
            via: self.via.clone(),
        })
    }
}

/// Write one log entry for `entity` and `action`, creating either
/// identifier on first use.
///
/// # Errors
///
/// Returns `EventLogError` if the transaction cannot begin, a write fails,
/// or the commit fails. The transaction is rolled back on error.
pub async fn record_event(
    store: &dyn Store,
    names: &TableNames,
    database: &str,
    entity: &str,
    action: &str,
    options: EventOptions,
) -> Result<LogRecord, EventLogError> {
    let mut tx = store.begin(database).await?;
    match write_event(tx.as_ref(), names, entity, action, options).await {
        Ok(record) => {
            tx.commit().await?;
            tracing::debug!(database, entity, action, log_id = ?record.id, "recorded manual event");
            Ok(record)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(database, error = %rollback, "rollback of manual event failed");
            }
            Err(err)
        }
    }
}

async fn write_event(
    tx: &dyn Transaction,
    names: &TableNames,
    entity: &str,
    action: &str,
    options: EventOptions,
) -> Result<LogRecord, EventLogError> {
    let writer = LogWriter::new(names, tx);
    let action_id = writer.action_id(action).await?;
    let entity_id = writer.entity_id(entity).await?;
    let source_entity = options.source();

    writer
        .write(LogRecord {
            id: None,
            created_at: Utc::now(),
            action_id,
            entity_id,
            user_id: options.user_id,
            affected: AffectedKey {
                id: options.id,
                secondary_id: options.secondary_id,
                string_id: options.string_id,
            },
            data: LogData {
                fields: options.fields,
                source_entity,
            },
        })
        .await
}
