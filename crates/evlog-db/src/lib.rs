//! # evlog-db
//!
//! libSQL backing store for the evlog audit engine.
//!
//! Hosts any number of logical databases, each a local libSQL file. The
//! store introspects every database's tables and foreign keys, names the
//! resulting relations, compiles `TraversalQuery` plans to SQL, and runs
//! registered `ModelExtension` hooks after each record mutation made through
//! a `LibsqlTransaction`.

pub mod database;
pub mod error;
pub mod helpers;
pub mod hooks;
mod migrations;
pub mod query;
pub mod schema;
#[cfg(test)]
mod test_support;
pub mod transaction;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use evlog_config::EvlogConfig;
use evlog_core::errors::StoreError;
use evlog_core::query::{RawRecord, RelationRole, TraversalQuery};
use evlog_core::record::{EntityDescriptor, Record};
use evlog_core::store::{ModelExtension, Store, Transaction};
use evlog_core::tables::TableNames;

use database::LogicalDatabase;
use error::DatabaseError;
use hooks::HookRegistry;
pub use migrations::event_log_script;
use query::run_traversal;
pub use transaction::LibsqlTransaction;

/// A set of logical libSQL databases sharing one hook registry.
#[derive(Debug, Default)]
pub struct LibsqlStore {
    databases: RwLock<BTreeMap<String, Arc<LogicalDatabase>>>,
    hooks: Arc<HookRegistry>,
}

impl LibsqlStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every database listed in `config`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any database cannot be opened.
    pub async fn open(config: &EvlogConfig) -> Result<Self, DatabaseError> {
        let store = Self::new();
        for db in &config.databases {
            store.attach(&db.name, &db.path).await?;
        }
        Ok(store)
    }

    /// Open the libSQL file at `path` as logical database `name`, replacing
    /// any database previously attached under that name.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file cannot be opened or introspected.
    pub async fn attach(&self, name: &str, path: &str) -> Result<(), DatabaseError> {
        let database = LogicalDatabase::open(name, path).await?;
        self.databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(database));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StoreError::UnknownDatabase` if nothing is attached as `name`.
    pub fn database(&self, name: &str) -> Result<Arc<LogicalDatabase>, DatabaseError> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownDatabase(name.to_string()).into())
    }

    /// Begin a transaction whose record mutations fire lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database is unknown or cannot begin.
    pub async fn transaction(&self, database: &str) -> Result<LibsqlTransaction, DatabaseError> {
        LibsqlTransaction::begin(self.database(database)?, Arc::clone(&self.hooks)).await
    }

    /// Run DDL (or any script) on `database`, then re-read its schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the script or introspection fails.
    pub async fn execute_batch(&self, database: &str, sql: &str) -> Result<(), DatabaseError> {
        let db = self.database(database)?;
        db.conn().execute_batch(sql).await?;
        db.refresh_schema().await
    }

    /// Create the event-log tables in `database` if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the script fails.
    pub async fn install_event_log_tables(
        &self,
        database: &str,
        names: &TableNames,
    ) -> Result<(), DatabaseError> {
        let db = self.database(database)?;
        migrations::install(db.conn(), names).await?;
        tracing::info!(database, log_table = %names.log, "event log tables installed");
        db.refresh_schema().await
    }

    /// Run a traversal outside any transaction and return the root rows.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the traversal fails.
    pub async fn find(
        &self,
        database: &str,
        query: &TraversalQuery,
    ) -> Result<Vec<Record>, DatabaseError> {
        let raw = self.traverse(database, query).await?;
        Ok(raw
            .into_iter()
            .map(|r| Record::from_persisted(database, &query.root, r.columns))
            .collect())
    }

    /// Insert `record` in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write or a hook fails; nothing is
    /// persisted in that case.
    pub async fn insert(&self, record: &mut Record) -> Result<(), DatabaseError> {
        let tx = self.transaction(record.database()).await?;
        let result = tx.insert(record).await;
        finish(tx, result).await
    }

    /// Update `record` in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write or a hook fails; nothing is
    /// persisted in that case.
    pub async fn update(&self, record: &mut Record) -> Result<(), DatabaseError> {
        let tx = self.transaction(record.database()).await?;
        let result = tx.update(record).await;
        finish(tx, result).await
    }

    /// Delete `record` in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write or a hook fails; nothing is
    /// persisted in that case.
    pub async fn delete(&self, record: &Record) -> Result<(), DatabaseError> {
        let tx = self.transaction(record.database()).await?;
        let result = tx.delete(record).await;
        finish(tx, result).await
    }

    async fn traverse(
        &self,
        database: &str,
        query: &TraversalQuery,
    ) -> Result<Vec<RawRecord>, DatabaseError> {
        let db = self.database(database)?;
        run_traversal(db.conn(), database, &db.schema(), &db.aliases(), query).await
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    mut tx: LibsqlTransaction,
    result: Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

#[async_trait]
impl Store for LibsqlStore {
    fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    async fn has_table(&self, database: &str, table: &str) -> Result<bool, StoreError> {
        Ok(self.database(database)?.schema().has_table(table))
    }

    fn set_accessor_name(
        &self,
        database: &str,
        role: RelationRole,
        name: &str,
    ) -> Result<(), StoreError> {
        Ok(self.database(database)?.set_alias(role, name)?)
    }

    async fn find_raw(
        &self,
        database: &str,
        query: &TraversalQuery,
    ) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self.traverse(database, query).await?)
    }

    async fn begin(&self, database: &str) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(self.transaction(database).await?))
    }

    fn register_extension(&self, extension: Arc<dyn ModelExtension>) {
        self.hooks.register(extension);
    }

    fn reevaluate_entity(&self, entity: &EntityDescriptor) {
        self.hooks.reevaluate(entity);
    }
}
