//! Boundary traits between the audit engine and the backing store.
//!
//! The engine never executes SQL or manages connections. It describes what
//! to read (`TraversalQuery`) and what to write (`insert_row`) against these
//! traits, and the store calls back into registered `ModelExtension`s after
//! every insert, update, and delete made through it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::query::{RawRecord, RelationRole, TraversalQuery};
use crate::record::{EntityDescriptor, Record};
use crate::schema::KeyColumn;
use crate::value::Value;

/// An open transaction on one logical database.
///
/// Writes issued through `insert_row` are raw: they never trigger lifecycle
/// hooks, so extensions can write from inside a hook without recursing.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// The logical database this transaction runs on.
    fn database(&self) -> &str;

    /// Primary-key columns of `entity`, in key order.
    async fn key_columns(&self, entity: &str) -> Result<Vec<KeyColumn>, StoreError>;

    /// Execute a traversal inside this transaction.
    async fn find_raw(&self, query: &TraversalQuery) -> Result<Vec<RawRecord>, StoreError>;

    /// Insert one row and return its row id.
    async fn insert_row(&self, entity: &str, values: &[(String, Value)])
    -> Result<i64, StoreError>;

    /// Commit. The transaction cannot be used afterwards.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll back. The transaction cannot be used afterwards.
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Behavior attached to record lifecycles.
///
/// The store asks `is_applicable` once per entity and caches the answer
/// until `Store::reevaluate_entity` is called for that entity. Hooks run
/// after the mutation succeeded, inside the mutation's transaction; an error
/// fails the mutation.
#[async_trait]
pub trait ModelExtension: Send + Sync {
    fn name(&self) -> &str;

    fn is_applicable(&self, entity: &EntityDescriptor) -> bool;

    async fn after_insert(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()>;

    async fn after_update(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()>;

    async fn after_delete(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()>;
}

/// A relational store hosting one or more logical databases.
#[async_trait]
pub trait Store: Send + Sync {
    /// Names of all logical databases.
    fn database_names(&self) -> Vec<String>;

    async fn has_table(&self, database: &str, table: &str) -> Result<bool, StoreError>;

    /// Give the relation identified by `role` an explicit accessor name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database or the relation does not exist.
    fn set_accessor_name(
        &self,
        database: &str,
        role: RelationRole,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Execute a traversal outside any caller transaction.
    async fn find_raw(
        &self,
        database: &str,
        query: &TraversalQuery,
    ) -> Result<Vec<RawRecord>, StoreError>;

    async fn begin(&self, database: &str) -> Result<Box<dyn Transaction>, StoreError>;

    /// Attach an extension to every record mutation made through the store.
    fn register_extension(&self, extension: Arc<dyn ModelExtension>);

    /// Drop any cached applicability decision for `entity`.
    fn reevaluate_entity(&self, entity: &EntityDescriptor);
}
