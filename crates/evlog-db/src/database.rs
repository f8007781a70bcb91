//! One logical database: a libSQL file, its introspected schema, and the
//! explicit accessor names assigned to its relations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use evlog_core::errors::StoreError;
use evlog_core::query::RelationRole;
use libsql::Builder;

use crate::error::DatabaseError;
use crate::schema::{SchemaGraph, introspect};

pub struct LogicalDatabase {
    name: String,
    db: libsql::Database,
    conn: libsql::Connection,
    schema: RwLock<Arc<SchemaGraph>>,
    aliases: RwLock<HashMap<RelationRole, String>>,
}

impl std::fmt::Debug for LogicalDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalDatabase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl LogicalDatabase {
    /// Open (or create) the database file at `path` and introspect it.
    ///
    /// Transactions run on their own connections, so an in-memory database
    /// (one per connection) cannot back a logical database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file cannot be opened or introspected.
    pub async fn open(name: &str, path: &str) -> Result<Self, DatabaseError> {
        if path == ":memory:" {
            return Err(DatabaseError::InvalidState(format!(
                "database '{name}' must be file-backed"
            )));
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA journal_mode: {e}")))?;
        configure(&conn).await?;

        let schema = introspect(&conn).await?;
        tracing::info!(database = name, path, "logical database attached");
        Ok(Self {
            name: name.to_string(),
            db,
            conn,
            schema: RwLock::new(Arc::new(schema)),
            aliases: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared connection used outside transactions.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// A fresh connection for one transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if connecting or configuring fails.
    pub async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.db.connect()?;
        configure(&conn).await?;
        Ok(conn)
    }

    #[must_use]
    pub fn schema(&self) -> Arc<SchemaGraph> {
        Arc::clone(&self.schema.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn aliases(&self) -> HashMap<RelationRole, String> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Give the relation `role` an explicit accessor name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownRelation` if no such relation exists.
    pub fn set_alias(&self, role: RelationRole, name: &str) -> Result<(), DatabaseError> {
        if !self.schema().has_role(&role) {
            return Err(StoreError::UnknownRelation {
                table: role.table().to_string(),
                relation: name.to_string(),
            }
            .into());
        }
        tracing::debug!(database = %self.name, ?role, name, "accessor name assigned");
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role, name.to_string());
        Ok(())
    }

    /// Re-read tables and relations after DDL.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if introspection fails.
    pub async fn refresh_schema(&self) -> Result<(), DatabaseError> {
        let schema = introspect(&self.conn).await?;
        *self.schema.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(schema);
        Ok(())
    }
}

/// Per-connection settings.
async fn configure(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    // Enable foreign keys (must be per-connection in SQLite)
    conn.execute("PRAGMA foreign_keys = ON", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;
    conn.query("PRAGMA busy_timeout = 5000", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;
    Ok(())
}
