use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::affected::AffectedKey;

/// An immutable audit entry.
///
/// For cascaded entries `entity_id` refers to the group's target entity and
/// `data.source_entity` names where the change originated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LogRecord {
    /// Row id, assigned when the record is written.
    pub id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub action_id: i64,
    pub entity_id: i64,
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub affected: AffectedKey,
    pub data: LogData,
}

/// The structured payload stored in the log table's `data` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LogData {
    pub fields: Vec<String>,
    #[serde(rename = "sourceEntity")]
    pub source_entity: Option<SourceEntity>,
}

/// Provenance of a cascaded or manually injected entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SourceEntity {
    pub name: String,
    pub via: Option<String>,
}
