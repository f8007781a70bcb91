//! Transactions on one logical database.
//!
//! `insert`, `update`, and `delete` are the record-level mutations: they
//! write, then run the lifecycle hooks of every applicable extension inside
//! the same transaction. A hook failure surfaces as the mutation's error and
//! the caller rolls back (dropping the transaction also rolls back).
//!
//! `insert_row` is the raw write extensions use from inside hooks; it never
//! dispatches.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use evlog_core::errors::StoreError;
use evlog_core::query::{Filter, RawRecord, TraversalQuery};
use evlog_core::record::Record;
use evlog_core::schema::KeyColumn;
use evlog_core::store::Transaction;
use evlog_core::value::Value;
use libsql::TransactionBehavior;
use tokio::sync::Mutex;

use crate::database::LogicalDatabase;
use crate::error::DatabaseError;
use crate::helpers::{from_libsql, quote_ident, to_libsql};
use crate::hooks::{HookRegistry, LifecycleEvent};
use crate::query::run_traversal;
use crate::schema::TableInfo;

pub struct LibsqlTransaction {
    database: Arc<LogicalDatabase>,
    hooks: Arc<HookRegistry>,
    inner: Mutex<Option<libsql::Transaction>>,
}

impl std::fmt::Debug for LibsqlTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlTransaction")
            .field("database", &self.database.name())
            .finish_non_exhaustive()
    }
}

impl LibsqlTransaction {
    /// Begin an immediate transaction on a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if connecting or beginning fails.
    pub async fn begin(
        database: Arc<LogicalDatabase>,
        hooks: Arc<HookRegistry>,
    ) -> Result<Self, DatabaseError> {
        let conn = database.connect().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;
        Ok(Self {
            database,
            hooks,
            inner: Mutex::new(Some(tx)),
        })
    }

    /// Insert `record`, reload it with defaults and generated keys filled
    /// in, and run the insert hooks.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write fails or a hook fails.
    pub async fn insert(&self, record: &mut Record) -> Result<(), DatabaseError> {
        let schema = self.database.schema();
        let table = schema.table(self.database.name(), record.entity())?;
        let values: Vec<(String, Value)> = record
            .values()
            .iter()
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        let rowid = self.write_row(table, &values).await?;

        let keys = table.key_columns();
        let by_key = !keys.is_empty()
            && keys
                .iter()
                .all(|k| record.get(&k.name).is_some_and(|v| !v.is_null()));
        let row = if by_key {
            let filter: Vec<(String, Value)> = keys
                .iter()
                .filter_map(|k| record.get(&k.name).map(|v| (k.name.clone(), v.clone())))
                .collect();
            self.select_row(table, &filter).await?
        } else {
            self.select_by_rowid(table, rowid).await?
        };
        record.mark_persisted(row);

        self.hooks
            .dispatch(LifecycleEvent::Insert, record, self)
            .await?;
        Ok(())
    }

    /// Write the changed columns of `record` and run the update hooks.
    /// Hooks see the record with its changes still pending; it is marked
    /// persisted afterwards. A record without changes is left alone.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the record was never persisted, the write
    /// fails, or a hook fails.
    pub async fn update(&self, record: &mut Record) -> Result<(), DatabaseError> {
        let changed = record.changed_columns();
        if changed.is_empty() {
            return Ok(());
        }

        let schema = self.database.schema();
        let table = schema.table(self.database.name(), record.entity())?;
        let key = persisted_key(table, record)?;

        let mut params: Vec<libsql::Value> = Vec::new();
        let mut assignments = Vec::with_capacity(changed.len());
        for column in &changed {
            params.push(to_libsql(record.get(column).unwrap_or(&Value::Null)));
            assignments.push(format!("{} = ?{}", quote_ident(column), params.len()));
        }
        let where_clause = key_clause(&key, &mut params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {where_clause}",
            quote_ident(&table.name),
            assignments.join(", ")
        );
        let affected = self.execute(&sql, params).await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }

        self.hooks
            .dispatch(LifecycleEvent::Update, record, self)
            .await?;

        let mut row = record.persisted_values().clone();
        row.extend(record.values().iter().map(|(c, v)| (c.clone(), v.clone())));
        record.mark_persisted(row);
        Ok(())
    }

    /// Delete the row behind `record` and run the delete hooks.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the record was never persisted, the write
    /// fails, or a hook fails.
    pub async fn delete(&self, record: &Record) -> Result<(), DatabaseError> {
        let schema = self.database.schema();
        let table = schema.table(self.database.name(), record.entity())?;
        let key = persisted_key(table, record)?;

        let mut params = Vec::new();
        let where_clause = key_clause(&key, &mut params);
        let sql = format!("DELETE FROM {} WHERE {where_clause}", quote_ident(&table.name));
        if self.execute(&sql, params).await? == 0 {
            return Err(DatabaseError::NoResult);
        }

        self.hooks
            .dispatch(LifecycleEvent::Delete, record, self)
            .await?;
        Ok(())
    }

    /// Run a traversal and return the root rows as records.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the traversal fails.
    pub async fn find(&self, query: &TraversalQuery) -> Result<Vec<Record>, DatabaseError> {
        let raw = self.traverse(query).await?;
        Ok(raw
            .into_iter()
            .map(|r| Record::from_persisted(self.database.name(), &query.root, r.columns))
            .collect())
    }

    /// The first row of `entity` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn find_one(
        &self,
        entity: &str,
        filter: Filter,
    ) -> Result<Option<Record>, DatabaseError> {
        let query = TraversalQuery::new(entity).filter(filter).limit(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    async fn traverse(&self, query: &TraversalQuery) -> Result<Vec<RawRecord>, DatabaseError> {
        let guard = self.inner.lock().await;
        let tx = guard.as_ref().ok_or_else(finished)?;
        run_traversal(
            tx,
            self.database.name(),
            &self.database.schema(),
            &self.database.aliases(),
            query,
        )
        .await
    }

    async fn execute(&self, sql: &str, params: Vec<libsql::Value>) -> Result<u64, DatabaseError> {
        let guard = self.inner.lock().await;
        let tx = guard.as_ref().ok_or_else(finished)?;
        tracing::trace!(sql, "executing");
        Ok(tx.execute(sql, libsql::params_from_iter(params)).await?)
    }

    async fn write_row(
        &self,
        table: &TableInfo,
        values: &[(String, Value)],
    ) -> Result<i64, DatabaseError> {
        if let Some((column, _)) = values.iter().find(|(c, _)| !table.has_column(c)) {
            return Err(DatabaseError::Query(format!(
                "table {} has no column '{column}'",
                table.name
            )));
        }
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&table.name))
        } else {
            let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&table.name),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let params: Vec<libsql::Value> = values.iter().map(|(_, v)| to_libsql(v)).collect();

        let guard = self.inner.lock().await;
        let tx = guard.as_ref().ok_or_else(finished)?;
        tracing::trace!(sql = %sql, "inserting");
        tx.execute(&sql, libsql::params_from_iter(params)).await?;
        Ok(tx.last_insert_rowid())
    }

    async fn select_row(
        &self,
        table: &TableInfo,
        filter: &[(String, Value)],
    ) -> Result<BTreeMap<String, Value>, DatabaseError> {
        let query = TraversalQuery::new(&table.name).filter(filter.iter().cloned().collect());
        self.traverse(&query)
            .await?
            .into_iter()
            .next()
            .map(|r| r.columns)
            .ok_or(DatabaseError::NoResult)
    }

    async fn select_by_rowid(
        &self,
        table: &TableInfo,
        rowid: i64,
    ) -> Result<BTreeMap<String, Value>, DatabaseError> {
        let columns = table.column_names();
        let projection: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE rowid = ?1",
            projection.join(", "),
            quote_ident(&table.name)
        );

        let guard = self.inner.lock().await;
        let tx = guard.as_ref().ok_or_else(finished)?;
        let mut rows = tx.query(&sql, [rowid]).await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let mut values = BTreeMap::new();
        for (i, column) in columns.into_iter().enumerate() {
            let index = i32::try_from(i)
                .map_err(|_| DatabaseError::Query("too many columns".into()))?;
            values.insert(column, from_libsql(row.get_value(index)?));
        }
        Ok(values)
    }
}

fn finished() -> DatabaseError {
    DatabaseError::InvalidState("transaction already finished".into())
}

/// Key column values as last persisted.
fn persisted_key(table: &TableInfo, record: &Record) -> Result<Vec<(String, Value)>, DatabaseError> {
    let keys: Vec<KeyColumn> = table.key_columns();
    if keys.is_empty() {
        return Err(StoreError::NoPrimaryKey(table.name.clone()).into());
    }
    keys.into_iter()
        .map(|k| {
            record
                .persisted_values()
                .get(&k.name)
                .cloned()
                .map(|v| (k.name.clone(), v))
                .ok_or_else(|| {
                    DatabaseError::InvalidState(format!(
                        "{} record has no persisted value for key '{}'",
                        record.descriptor(),
                        k.name
                    ))
                })
        })
        .collect()
}

fn key_clause(key: &[(String, Value)], params: &mut Vec<libsql::Value>) -> String {
    key.iter()
        .map(|(column, value)| {
            params.push(to_libsql(value));
            format!("{} = ?{}", quote_ident(column), params.len())
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[async_trait]
impl Transaction for LibsqlTransaction {
    fn database(&self) -> &str {
        self.database.name()
    }

    async fn key_columns(&self, entity: &str) -> Result<Vec<KeyColumn>, StoreError> {
        let schema = self.database.schema();
        Ok(schema.table(self.database.name(), entity)?.key_columns())
    }

    async fn find_raw(&self, query: &TraversalQuery) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self.traverse(query).await?)
    }

    async fn insert_row(
        &self,
        entity: &str,
        values: &[(String, Value)],
    ) -> Result<i64, StoreError> {
        let schema = self.database.schema();
        let table = schema.table(self.database.name(), entity)?;
        Ok(self.write_row(table, values).await?)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.inner.get_mut().take().ok_or_else(finished)?;
        tx.commit().await.map_err(DatabaseError::from)?;
        tracing::trace!(database = %self.database.name(), "transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.inner.get_mut().take().ok_or_else(finished)?;
        tx.rollback().await.map_err(DatabaseError::from)?;
        tracing::trace!(database = %self.database.name(), "transaction rolled back");
        Ok(())
    }
}
