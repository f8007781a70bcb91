use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A logical table registered for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MonitoredEntity {
    /// Table name, unique per logical database.
    pub identifier: String,
    /// Row id of the entity in the entity table.
    pub store_id: i64,
    /// Group memberships, in the order the store returned them.
    pub groups: Vec<GroupMembership>,
}

/// Membership of a monitored entity in a group.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_identifier: String,
    /// Dot-delimited relation hops from the entity to the group's target.
    /// Empty means the entity relates to the target directly.
    pub via: String,
}

/// A named aggregation point whose target entity receives cascaded entries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Group {
    pub identifier: String,
    pub target_entity: TargetEntity,
}

/// The monitored entity a group points to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TargetEntity {
    pub store_id: i64,
    pub identifier: String,
}
