//! Reading the event log back.

use evlog_core::entities::LogRecord;
use evlog_core::query::{Filter, Selection, TraversalQuery};
use evlog_core::store::Store;
use evlog_core::tables::TableNames;
use evlog_core::value::Value;

use crate::error::EventLogError;
use crate::writer::parse_log_row;

const DEFAULT_LIMIT: u32 = 100;

/// Criteria for [`find_logs`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Action identifier, e.g. `"update"`.
    pub action: Option<String>,
    /// Identifier of the entity the entry is filed under.
    pub entity: Option<String>,
    /// `data.sourceEntity.name`; cascaded and manual entries carry one.
    pub source_entity: Option<String>,
    pub user_id: Option<i64>,
    pub affected_id: Option<i64>,
    /// Maximum number of entries, newest first. Defaults to 100.
    pub limit: Option<u32>,
}

/// Log entries of `database` matching `filter`, newest first.
///
/// # Errors
///
/// Returns `EventLogError` if a query fails or a row cannot be parsed.
pub async fn find_logs(
    store: &dyn Store,
    names: &TableNames,
    database: &str,
    filter: &LogFilter,
) -> Result<Vec<LogRecord>, EventLogError> {
    let mut conditions = Filter::new();
    for (table, column, identifier) in [
        (&names.action, names.action_fk(), filter.action.as_deref()),
        (&names.entity, names.entity_fk(), filter.entity.as_deref()),
    ] {
        if let Some(identifier) = identifier {
            let Some(id) = identifier_id(store, database, table, identifier).await? else {
                return Ok(Vec::new());
            };
            conditions = conditions.eq(&column, id);
        }
    }
    if let Some(user_id) = filter.user_id {
        conditions = conditions.eq("userId", user_id);
    }
    if let Some(affected_id) = filter.affected_id {
        conditions = conditions.eq("affectedId", affected_id);
    }

    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
    let mut query = TraversalQuery::new(&names.log)
        .filter(conditions)
        .order_by_desc("id");
    // The source entity lives inside the JSON payload, so it is matched
    // after parsing and the limit can only be applied afterwards.
    if filter.source_entity.is_none() {
        query = query.limit(limit);
    }

    let rows = store.find_raw(database, &query).await?;
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut records = Vec::new();
    for row in &rows {
        if records.len() >= limit {
            break;
        }
        let record = parse_log_row(names, row)?;
        let matches = filter.source_entity.as_ref().is_none_or(|name| {
            record
                .data
                .source_entity
                .as_ref()
                .is_some_and(|s| &s.name == name)
        });
        if matches {
            records.push(record);
        }
    }
    Ok(records)
}

async fn identifier_id(
    store: &dyn Store,
    database: &str,
    table: &str,
    identifier: &str,
) -> Result<Option<i64>, EventLogError> {
    let query = TraversalQuery::new(table)
        .select(Selection::columns(&["id"]))
        .filter(Filter::new().eq("identifier", identifier));
    let rows = store.find_raw(database, &query).await?;
    Ok(rows.first().and_then(|r| r.get("id")).and_then(Value::as_i64))
}
