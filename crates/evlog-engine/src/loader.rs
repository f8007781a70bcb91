//! Configuration loading.
//!
//! Reads monitored entities, their group memberships and the groups' targets
//! from the store in one traversal, builds a complete snapshot, swaps it in,
//! then asks the store to re-evaluate hook applicability for every entity
//! whose monitored status may have changed.

use std::collections::{BTreeMap, HashMap};

use evlog_core::entities::{Group, GroupMembership, MonitoredEntity, TargetEntity};
use evlog_core::query::{RawRecord, RelationRole, Selection, TraversalQuery};
use evlog_core::record::EntityDescriptor;
use evlog_core::store::Store;
use evlog_core::tables::{TARGET_ENTITY_ACCESSOR, TableNames};
use evlog_core::value::Value;

use crate::config_store::{ConfigStore, Snapshot};
use crate::error::EventLogError;

/// What loading one database did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The database has no log table and is not managed.
    Skipped,
    Loaded { entities: usize, groups: usize },
}

/// Load (or reload) the configuration of `database`.
///
/// # Errors
///
/// Returns `EventLogError::Configuration` if a required table is missing,
/// `EventLogError::Resolution` if a group targets an unmonitored entity, and
/// `EventLogError::Store` if the configuration query fails. The previous
/// snapshot stays installed on every error.
pub async fn load_database(
    store: &dyn Store,
    configs: &ConfigStore,
    names: &TableNames,
    database: &str,
) -> Result<LoadOutcome, EventLogError> {
    if !store.has_table(database, &names.log).await? {
        tracing::debug!(database, table = %names.log, "no log table, database not managed");
        return Ok(LoadOutcome::Skipped);
    }
    for table in names.required() {
        if !store.has_table(database, table).await? {
            return Err(EventLogError::Configuration {
                database: database.to_string(),
                message: format!("the table {table} does not exist"),
            });
        }
    }

    if !configs.is_registered(database) {
        install_accessor_names(store, names, database)?;
        configs.mark_registered(database);
        tracing::debug!(database, "database registered for event logging");
    }

    let previous = configs
        .snapshot(database)
        .map(|s| s.identifiers())
        .unwrap_or_default();

    let query = TraversalQuery::new(&names.entity)
        .fetch(&names.mapping, Selection::All)
        .fetch(&names.group, Selection::All);
    let rows = store.find_raw(database, &query).await?;
    let snapshot = build_snapshot(names, database, &rows)?;

    let loaded = snapshot.identifiers();
    let (entities, groups) = (snapshot.entity_count(), snapshot.group_count());
    configs.install(database, snapshot);
    tracing::info!(database, entities, groups, "event log configuration installed");

    for identifier in &loaded {
        store.reevaluate_entity(&EntityDescriptor::new(database, identifier));
    }
    for removed in previous.difference(&loaded) {
        tracing::debug!(database, entity = %removed, "entity no longer monitored");
        store.reevaluate_entity(&EntityDescriptor::new(database, removed));
    }
    Ok(LoadOutcome::Loaded { entities, groups })
}

/// The group table references the entity table twice (its target, and its
/// members through the mapping table), so both ends get explicit names.
fn install_accessor_names(
    store: &dyn Store,
    names: &TableNames,
    database: &str,
) -> Result<(), EventLogError> {
    store.set_accessor_name(
        database,
        RelationRole::Reference {
            table: names.group.clone(),
            column: names.entity_fk(),
        },
        TARGET_ENTITY_ACCESSOR,
    )?;
    store.set_accessor_name(
        database,
        RelationRole::Mapping {
            table: names.group.clone(),
            via: names.mapping.clone(),
        },
        &names.entity,
    )?;
    store.set_accessor_name(
        database,
        RelationRole::Mapping {
            table: names.entity.clone(),
            via: names.mapping.clone(),
        },
        &names.group,
    )?;
    Ok(())
}

fn build_snapshot(
    names: &TableNames,
    database: &str,
    rows: &[RawRecord],
) -> Result<Snapshot, EventLogError> {
    let mut entities = Vec::with_capacity(rows.len());
    let mut by_store_id: HashMap<i64, String> = HashMap::new();
    let mut group_targets: BTreeMap<String, i64> = BTreeMap::new();

    for row in rows {
        let identifier = text(row, &names.entity, "identifier")?;
        let store_id = integer(row, &names.entity, "id")?;

        let mut groups = Vec::new();
        for mapping in row.related(&names.mapping) {
            let via = mapping
                .get("via")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string();
            for group in mapping.related(&names.group) {
                let group_identifier = text(group, &names.group, "identifier")?;
                let target = integer(group, &names.group, &names.entity_fk())?;
                group_targets.entry(group_identifier.clone()).or_insert(target);
                groups.push(GroupMembership {
                    group_identifier,
                    via: via.clone(),
                });
            }
        }

        by_store_id.insert(store_id, identifier.clone());
        entities.push(MonitoredEntity {
            identifier,
            store_id,
            groups,
        });
    }

    let groups = group_targets
        .into_iter()
        .map(|(identifier, target_store_id)| {
            let target = by_store_id
                .get(&target_store_id)
                .ok_or_else(|| EventLogError::Resolution {
                    database: database.to_string(),
                    group: identifier.clone(),
                    target_store_id,
                })?;
            Ok(Group {
                identifier,
                target_entity: TargetEntity {
                    store_id: target_store_id,
                    identifier: target.clone(),
                },
            })
        })
        .collect::<Result<Vec<_>, EventLogError>>()?;

    Ok(Snapshot::new(entities, groups))
}

fn text(row: &RawRecord, table: &str, column: &str) -> Result<String, EventLogError> {
    row.get(column)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| EventLogError::invalid_row(table, format!("{column} is not text")))
}

fn integer(row: &RawRecord, table: &str, column: &str) -> Result<i64, EventLogError> {
    row.get(column)
        .and_then(Value::as_i64)
        .ok_or_else(|| EventLogError::invalid_row(table, format!("{column} is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(pairs: &[(&str, Value)], related: &[(&str, Vec<RawRecord>)]) -> RawRecord {
        RawRecord {
            columns: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            related: related
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    fn entity_row(id: i64, identifier: &str, memberships: Vec<RawRecord>) -> RawRecord {
        raw(
            &[("id", Value::Integer(id)), ("identifier", identifier.into())],
            &[("eventLogGroup_eventLogEntity", memberships)],
        )
    }

    fn membership(via: &str, group: &str, target: i64) -> RawRecord {
        raw(
            &[("via", via.into())],
            &[(
                "eventLogGroup",
                vec![raw(
                    &[
                        ("identifier", group.into()),
                        ("id_eventLogEntity", Value::Integer(target)),
                    ],
                    &[],
                )],
            )],
        )
    }

    #[test]
    fn flattens_memberships_and_resolves_targets() {
        let names = TableNames::default();
        let rows = vec![
            entity_row(1, "article", vec![]),
            entity_row(
                2,
                "comment",
                vec![membership("", "articleActivity", 1)],
            ),
            entity_row(
                3,
                "reply",
                vec![membership("comment", "articleActivity", 1)],
            ),
        ];
        let snapshot = build_snapshot(&names, "main", &rows).unwrap();

        assert_eq!(snapshot.entity_count(), 3);
        assert_eq!(snapshot.group_count(), 1);
        assert!(snapshot.entity("article").unwrap().groups.is_empty());
        assert_eq!(
            snapshot.entity("reply").unwrap().groups,
            vec![GroupMembership {
                group_identifier: "articleActivity".into(),
                via: "comment".into(),
            }]
        );
        assert_eq!(
            snapshot.group("articleActivity").unwrap().target_entity,
            TargetEntity {
                store_id: 1,
                identifier: "article".into(),
            }
        );
    }

    #[test]
    fn unknown_group_target_is_a_resolution_error() {
        let names = TableNames::default();
        let rows = vec![entity_row(2, "comment", vec![membership("", "orphan", 99)])];
        let err = build_snapshot(&names, "main", &rows).unwrap_err();
        assert!(matches!(
            err,
            EventLogError::Resolution { ref group, target_store_id: 99, .. } if group == "orphan"
        ));
    }

    #[test]
    fn null_via_means_direct_relation() {
        let names = TableNames::default();
        let mut m = membership("", "g", 1);
        m.columns.insert("via".into(), Value::Null);
        let rows = vec![entity_row(1, "article", vec![m])];
        let snapshot = build_snapshot(&names, "main", &rows).unwrap();
        assert_eq!(snapshot.entity("article").unwrap().groups[0].via, "");
    }
}
