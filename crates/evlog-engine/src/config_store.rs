//! Per-database configuration snapshots.
//!
//! A snapshot is immutable once built. Loading a database builds a complete
//! new snapshot and swaps it in; hooks clone the `Arc` once and keep using
//! that snapshot even if a reload replaces it mid-flight.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use evlog_core::entities::{Group, MonitoredEntity};

/// Monitored entities and groups of one logical database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entities: HashMap<String, MonitoredEntity>,
    groups: HashMap<String, Group>,
}

impl Snapshot {
    #[must_use]
    pub fn new(entities: Vec<MonitoredEntity>, groups: Vec<Group>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.identifier.clone(), e))
                .collect(),
            groups: groups
                .into_iter()
                .map(|g| (g.identifier.clone(), g))
                .collect(),
        }
    }

    #[must_use]
    pub fn entity(&self, identifier: &str) -> Option<&MonitoredEntity> {
        self.entities.get(identifier)
    }

    #[must_use]
    pub fn group(&self, identifier: &str) -> Option<&Group> {
        self.groups.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entities.contains_key(identifier)
    }

    /// Monitored entity identifiers, sorted.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<String> {
        self.entities.keys().cloned().collect()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Current snapshot per database plus the set of databases that completed
/// first-time registration.
#[derive(Debug, Default)]
pub struct ConfigStore {
    snapshots: RwLock<HashMap<String, Arc<Snapshot>>>,
    registered: RwLock<HashSet<String>>,
}

impl ConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self, database: &str) -> Option<Arc<Snapshot>> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(database)
            .cloned()
    }

    /// Replace the snapshot of `database`, returning the previous one.
    pub fn install(&self, database: &str, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(database.to_string(), Arc::new(snapshot))
    }

    /// Whether `entity` is monitored in the current snapshot of `database`.
    #[must_use]
    pub fn is_monitored(&self, database: &str, entity: &str) -> bool {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(database)
            .is_some_and(|s| s.contains(entity))
    }

    /// Mark `database` registered. Returns `true` the first time.
    pub fn mark_registered(&self, database: &str) -> bool {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(database.to_string())
    }

    #[must_use]
    pub fn is_registered(&self, database: &str) -> bool {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(database)
    }
}
