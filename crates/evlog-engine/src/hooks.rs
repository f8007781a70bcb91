//! Lifecycle hook adapter: turns record mutations into log entries.

use async_trait::async_trait;
use chrono::Utc;
use evlog_core::affected::AffectedKey;
use evlog_core::entities::{LogData, LogRecord};
use evlog_core::enums::Action;
use evlog_core::query::Filter;
use evlog_core::record::{EntityDescriptor, Record};
use evlog_core::store::{ModelExtension, Transaction};
use evlog_core::value::Value;
use futures::future::try_join_all;

use crate::EventLog;
use crate::cascade::{CascadeSource, cascade};
use crate::error::EventLogError;
use crate::writer::LogWriter;

/// Name under which the engine registers with the store.
pub const EXTENSION_NAME: &str = "eventLog";

impl EventLog {
    /// Write the primary entry for `record`, then cascade it to every group
    /// the entity belongs to. All writes use `tx`.
    async fn log_mutation(
        &self,
        action: Action,
        record: &Record,
        fields: Vec<String>,
        tx: &dyn Transaction,
    ) -> Result<(), EventLogError> {
        let Some(snapshot) = self.configs.snapshot(record.database()) else {
            tracing::debug!(entity = %record.descriptor(), "no configuration loaded, not logging");
            return Ok(());
        };
        let Some(entity) = snapshot.entity(record.entity()) else {
            tracing::debug!(entity = %record.descriptor(), "entity no longer monitored, not logging");
            return Ok(());
        };

        let keys = tx.key_columns(record.entity()).await?;
        let writer = LogWriter::new(&self.names, tx);
        let action_id = writer.action_id(action.as_str()).await?;
        let entity_id = writer.entity_id(record.entity()).await?;

        let primary = writer
            .write(LogRecord {
                id: None,
                created_at: Utc::now(),
                action_id,
                entity_id,
                user_id: record.user_id(),
                affected: AffectedKey::derive(&keys, record.values()),
                data: LogData {
                    fields,
                    source_entity: None,
                },
            })
            .await?;
        tracing::debug!(
            entity = %record.descriptor(),
            action = %action,
            log_id = ?primary.id,
            groups = entity.groups.len(),
            "logged mutation"
        );

        if entity.groups.is_empty() {
            return Ok(());
        }

        let key: Filter = keys
            .iter()
            .map(|k| {
                let value = record.get(&k.name).cloned().unwrap_or(Value::Null);
                (k.name.clone(), value)
            })
            .collect();
        let source = CascadeSource {
            entity: record.entity(),
            key: &key,
            primary: &primary,
        };
        try_join_all(
            entity
                .groups
                .iter()
                .map(|membership| cascade(&snapshot, membership, source, tx, &writer)),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ModelExtension for EventLog {
    fn name(&self) -> &str {
        EXTENSION_NAME
    }

    fn is_applicable(&self, entity: &EntityDescriptor) -> bool {
        self.configs.is_monitored(&entity.database, &entity.name)
    }

    async fn after_insert(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
        self.log_mutation(Action::Insert, record, record.persisted_columns(), tx)
            .await?;
        Ok(())
    }

    async fn after_update(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
        self.log_mutation(Action::Update, record, record.changed_columns(), tx)
            .await?;
        Ok(())
    }

    async fn after_delete(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
        self.log_mutation(Action::Delete, record, record.persisted_columns(), tx)
            .await?;
        Ok(())
    }
}
