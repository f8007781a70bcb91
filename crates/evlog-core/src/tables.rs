//! Table and column naming for the event-log tables.
//!
//! All five tables derive from one configurable prefix. With the default
//! prefix `eventLog` the tables are `eventLog`, `eventLogEntity`,
//! `eventLogAction`, `eventLogGroup`, and `eventLogGroup_eventLogEntity`.

/// Default table-name prefix.
pub const DEFAULT_PREFIX: &str = "eventLog";

/// Accessor name installed for a group's reference to its target entity.
pub const TARGET_ENTITY_ACCESSOR: &str = "targetEntity";

/// Resolved names of the event-log tables and their foreign-key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub log: String,
    pub entity: String,
    pub action: String,
    pub group: String,
    pub mapping: String,
}

impl TableNames {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            log: prefix.to_string(),
            entity: format!("{prefix}Entity"),
            action: format!("{prefix}Action"),
            group: format!("{prefix}Group"),
            mapping: format!("{prefix}Group_{prefix}Entity"),
        }
    }

    /// Foreign-key column referencing the entity table (`id_eventLogEntity`).
    #[must_use]
    pub fn entity_fk(&self) -> String {
        format!("id_{}", self.entity)
    }

    /// Foreign-key column referencing the action table (`id_eventLogAction`).
    #[must_use]
    pub fn action_fk(&self) -> String {
        format!("id_{}", self.action)
    }

    /// Foreign-key column referencing the group table (`id_eventLogGroup`).
    #[must_use]
    pub fn group_fk(&self) -> String {
        format!("id_{}", self.group)
    }

    /// Every table the engine requires, entity table first.
    #[must_use]
    pub fn required(&self) -> [&str; 4] {
        [&self.entity, &self.action, &self.group, &self.mapping]
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_prefix_names() {
        let names = TableNames::default();
        assert_eq!(names.log, "eventLog");
        assert_eq!(names.entity, "eventLogEntity");
        assert_eq!(names.action, "eventLogAction");
        assert_eq!(names.group, "eventLogGroup");
        assert_eq!(names.mapping, "eventLogGroup_eventLogEntity");
        assert_eq!(names.entity_fk(), "id_eventLogEntity");
        assert_eq!(names.group_fk(), "id_eventLogGroup");
    }

    #[test]
    fn custom_prefix_is_applied_to_mapping_both_sides() {
        let names = TableNames::new("audit");
        assert_eq!(names.mapping, "auditGroup_auditEntity");
        assert_eq!(names.action_fk(), "id_auditAction");
    }
}
