//! Reading and writing rows of the event-log tables.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use evlog_core::affected::AffectedKey;
use evlog_core::entities::{LogData, LogRecord};
use evlog_core::query::{Filter, RawRecord, Selection, TraversalQuery};
use evlog_core::store::Transaction;
use evlog_core::tables::TableNames;
use evlog_core::value::Value;

use crate::error::EventLogError;

/// Writes log records inside one transaction.
pub struct LogWriter<'a> {
    names: &'a TableNames,
    tx: &'a dyn Transaction,
}

impl<'a> LogWriter<'a> {
    #[must_use]
    pub fn new(names: &'a TableNames, tx: &'a dyn Transaction) -> Self {
        Self { names, tx }
    }

    /// Row id of the action named `identifier`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `EventLogError` if the lookup or the insert fails.
    pub async fn action_id(&self, identifier: &str) -> Result<i64, EventLogError> {
        self.lookup_or_create(&self.names.action, identifier).await
    }

    /// Row id of the entity named `identifier`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `EventLogError` if the lookup or the insert fails.
    pub async fn entity_id(&self, identifier: &str) -> Result<i64, EventLogError> {
        self.lookup_or_create(&self.names.entity, identifier).await
    }

    async fn lookup_or_create(&self, table: &str, identifier: &str) -> Result<i64, EventLogError> {
        let query = TraversalQuery::new(table)
            .select(Selection::columns(&["id"]))
            .filter(Filter::new().eq("identifier", identifier));
        if let Some(row) = self.tx.find_raw(&query).await?.first() {
            return row
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| EventLogError::invalid_row(table, "id is not an integer"));
        }

        let id = self
            .tx
            .insert_row(table, &[("identifier".to_string(), identifier.into())])
            .await?;
        tracing::debug!(table, identifier, id, "created event log identifier");
        Ok(id)
    }

    /// Insert `record` into the log table and return it with its id set.
    ///
    /// # Errors
    ///
    /// Returns `EventLogError` if the payload cannot be serialized or the
    /// insert fails.
    pub async fn write(&self, mut record: LogRecord) -> Result<LogRecord, EventLogError> {
        let values = vec![
            (
                "created".to_string(),
                Value::from(
                    record
                        .created_at
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            ),
            (self.names.action_fk(), Value::from(record.action_id)),
            (self.names.entity_fk(), Value::from(record.entity_id)),
            ("userId".to_string(), Value::from(record.user_id)),
            ("affectedId".to_string(), Value::from(record.affected.id)),
            (
                "affectedSecondaryId".to_string(),
                Value::from(record.affected.secondary_id),
            ),
            (
                "affectedStringId".to_string(),
                Value::from(record.affected.string_id.clone()),
            ),
            ("data".to_string(), Value::from(serde_json::to_string(&record.data)?)),
        ];
        let id = self.tx.insert_row(&self.names.log, &values).await?;
        record.id = Some(id);
        Ok(record)
    }
}

/// Parse a raw row of the log table.
///
/// # Errors
///
/// Returns `EventLogError::InvalidRow` for missing or mistyped columns and
/// `EventLogError::Serialization` for a malformed `data` payload.
pub fn parse_log_row(names: &TableNames, row: &RawRecord) -> Result<LogRecord, EventLogError> {
    let table = names.log.as_str();
    let required = |column: &str| {
        row.get(column)
            .and_then(Value::as_i64)
            .ok_or_else(|| EventLogError::invalid_row(table, format!("missing {column}")))
    };
    let optional = |column: &str| row.get(column).and_then(Value::as_i64);

    let created = row
        .get("created")
        .and_then(Value::as_text)
        .ok_or_else(|| EventLogError::invalid_row(table, "missing created"))?;
    let data = match row.get("data").and_then(Value::as_text) {
        Some(text) if !text.is_empty() => serde_json::from_str(text)?,
        _ => LogData::default(),
    };

    Ok(LogRecord {
        id: Some(required("id")?),
        created_at: parse_datetime(table, created)?,
        action_id: required(names.action_fk().as_str())?,
        entity_id: required(names.entity_fk().as_str())?,
        user_id: optional("userId"),
        affected: AffectedKey {
            id: optional("affectedId"),
            secondary_id: optional("affectedSecondaryId"),
            string_id: row
                .get("affectedStringId")
                .and_then(Value::to_key_string),
        },
        data,
    })
}

/// Parse RFC 3339 or `SQLite`'s `datetime()` format.
fn parse_datetime(table: &str, s: &str) -> Result<DateTime<Utc>, EventLogError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| EventLogError::invalid_row(table, format!("bad created '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, Value)]) -> RawRecord {
        RawRecord {
            columns: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            related: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn parses_a_cascaded_row() {
        let names = TableNames::default();
        let record = parse_log_row(
            &names,
            &row(&[
                ("id", Value::Integer(3)),
                ("created", Value::from("2026-03-01T10:00:00.000Z")),
                ("id_eventLogAction", Value::Integer(2)),
                ("id_eventLogEntity", Value::Integer(7)),
                ("userId", Value::Null),
                ("affectedId", Value::Integer(69)),
                ("affectedSecondaryId", Value::Null),
                ("affectedStringId", Value::Null),
                (
                    "data",
                    Value::from(r#"{"fields":["identifier"],"sourceEntity":{"name":"eventLogAction","via":"eventLog.eventLogEntity"}}"#),
                ),
            ]),
        )
        .unwrap();

        assert_eq!(record.id, Some(3));
        assert_eq!(record.entity_id, 7);
        assert_eq!(record.affected.id, Some(69));
        assert_eq!(record.user_id, None);
        assert_eq!(
            record.data.source_entity.unwrap().via.as_deref(),
            Some("eventLog.eventLogEntity")
        );
    }

    #[test]
    fn accepts_sqlite_datetime_and_missing_data() {
        let names = TableNames::default();
        let record = parse_log_row(
            &names,
            &row(&[
                ("id", Value::Integer(1)),
                ("created", Value::from("2026-03-01 10:00:00")),
                ("id_eventLogAction", Value::Integer(1)),
                ("id_eventLogEntity", Value::Integer(1)),
                ("data", Value::Null),
            ]),
        )
        .unwrap();
        assert_eq!(record.data, LogData::default());
    }

    #[test]
    fn rejects_rows_without_action() {
        let names = TableNames::default();
        let err = parse_log_row(
            &names,
            &row(&[
                ("id", Value::Integer(1)),
                ("created", Value::from("2026-03-01 10:00:00")),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing id_eventLogAction"));
    }
}
