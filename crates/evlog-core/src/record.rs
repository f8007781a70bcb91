//! Record instances passed to lifecycle hooks.
//!
//! A `Record` tracks its current values next to the values last persisted,
//! so an update can report exactly the columns that changed. The acting user
//! travels on the instance itself.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// Identifies an entity (table) inside a logical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityDescriptor {
    pub database: String,
    pub name: String,
}

impl EntityDescriptor {
    #[must_use]
    pub fn new(database: &str, name: &str) -> Self {
        Self {
            database: database.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

/// One row of an entity, as seen by the code mutating it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    descriptor: EntityDescriptor,
    values: BTreeMap<String, Value>,
    persisted: BTreeMap<String, Value>,
    user_id: Option<i64>,
}

impl Record {
    /// A new, not yet persisted record.
    #[must_use]
    pub fn new(database: &str, entity: &str) -> Self {
        Self {
            descriptor: EntityDescriptor::new(database, entity),
            values: BTreeMap::new(),
            persisted: BTreeMap::new(),
            user_id: None,
        }
    }

    /// A record loaded from the store; all values count as persisted.
    #[must_use]
    pub fn from_persisted(database: &str, entity: &str, values: BTreeMap<String, Value>) -> Self {
        Self {
            descriptor: EntityDescriptor::new(database, entity),
            persisted: values.clone(),
            values,
            user_id: None,
        }
    }

    /// Builder-style setter for a column value.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Builder-style setter for the acting user.
    #[must_use]
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.values.insert(column.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub const fn set_user_id(&mut self, user_id: Option<i64>) {
        self.user_id = user_id;
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    #[must_use]
    pub const fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.descriptor.database
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.descriptor.name
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Values as of the last successful write or load.
    #[must_use]
    pub const fn persisted_values(&self) -> &BTreeMap<String, Value> {
        &self.persisted
    }

    /// Columns whose current value differs from the persisted state.
    #[must_use]
    pub fn changed_columns(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(column, value)| self.persisted.get(*column) != Some(*value))
            .map(|(column, _)| column.clone())
            .collect()
    }

    /// Every persisted column name.
    #[must_use]
    pub fn persisted_columns(&self) -> Vec<String> {
        self.persisted.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.changed_columns().is_empty()
    }

    /// Replace the persisted state with the given row (after a write).
    pub fn mark_persisted(&mut self, row: BTreeMap<String, Value>) {
        self.values.clone_from(&row);
        self.persisted = row;
    }
}
