//! Group cascades.
//!
//! When a member entity of a group changes, every row of the group's target
//! entity reachable from the changed row along the membership's `via` path
//! receives a copy of the primary log entry. Copies keep the primary's
//! action, user and fields, point at the target entity, and record where
//! they came from in `data.sourceEntity`.

use evlog_core::affected::AffectedKey;
use evlog_core::entities::{GroupMembership, LogData, LogRecord, SourceEntity};
use evlog_core::errors::StoreError;
use evlog_core::query::Filter;
use evlog_core::store::Transaction;

use crate::config_store::Snapshot;
use crate::error::EventLogError;
use crate::path::ViaPath;
use crate::writer::LogWriter;

/// The change being cascaded.
#[derive(Debug, Clone, Copy)]
pub struct CascadeSource<'a> {
    /// Identifier of the changed entity.
    pub entity: &'a str,
    /// Key of the changed row as `column = value` constraints.
    pub key: &'a Filter,
    /// The primary entry, already written.
    pub primary: &'a LogRecord,
}

/// Write one cascaded entry per target row reachable through `membership`.
/// Returns the number of entries written; reaching nothing is not an error.
///
/// # Errors
///
/// Returns `EventLogError` if the group is missing from the snapshot, the
/// traversal fails (for example an unresolvable relation name), or a write
/// fails.
pub async fn cascade(
    snapshot: &Snapshot,
    membership: &GroupMembership,
    source: CascadeSource<'_>,
    tx: &dyn Transaction,
    writer: &LogWriter<'_>,
) -> Result<usize, EventLogError> {
    let group = snapshot
        .group(&membership.group_identifier)
        .ok_or_else(|| {
            StoreError::InvalidState(format!(
                "group '{}' is not part of the configuration snapshot",
                membership.group_identifier
            ))
        })?;
    let target = &group.target_entity;
    let target_keys = tx.key_columns(&target.identifier).await?;

    let path = ViaPath::parse(&membership.via);
    let query = path.cascade_query(
        &target.identifier,
        &target_keys,
        source.entity,
        source.key.clone(),
    );
    let reachable = tx.find_raw(&query).await?;

    for row in &reachable {
        let record = LogRecord {
            id: None,
            created_at: source.primary.created_at,
            action_id: source.primary.action_id,
            entity_id: target.store_id,
            user_id: source.primary.user_id,
            affected: AffectedKey::derive(&target_keys, &row.columns),
            data: LogData {
                fields: source.primary.data.fields.clone(),
                source_entity: Some(SourceEntity {
                    name: source.entity.to_string(),
                    via: Some(membership.via.clone()),
                }),
            },
        };
        writer.write(record).await?;
    }

    tracing::debug!(
        group = %group.identifier,
        target = %target.identifier,
        via = %membership.via,
        count = reachable.len(),
        "cascaded log entries"
    );
    Ok(reachable.len())
}
