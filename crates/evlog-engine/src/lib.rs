//! # evlog-engine
//!
//! Audit event logging for record lifecycles.
//!
//! Which tables are audited, and how their changes fan out to related
//! records, is configuration stored in the database itself:
//!
//! - `eventLogEntity` lists the monitored tables.
//! - `eventLogGroup` names a target table per group.
//! - `eventLogGroup_eventLogEntity` makes a table a member of a group, with
//!   a dot-separated relation path (`via`) leading to the group's target.
//!
//! Every insert, update, or delete of a monitored record writes one entry to
//! `eventLog` inside the mutation's transaction, plus one cascaded entry for
//! every target record reachable through each of the entity's groups.
//!
//! ```no_run
//! # async fn run(store: std::sync::Arc<dyn evlog_core::store::Store>) -> Result<(), evlog_engine::EventLogError> {
//! use std::sync::Arc;
//! use evlog_config::EventLogConfig;
//! use evlog_engine::{EventLog, EventOptions};
//!
//! let event_log = Arc::new(EventLog::new(&EventLogConfig::default()));
//! event_log.attach(store.as_ref()).await?;
//!
//! event_log
//!     .record_event(
//!         store.as_ref(),
//!         "main",
//!         "article",
//!         "import",
//!         EventOptions { id: Some(7), ..EventOptions::default() },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod config_store;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod logs;
pub mod manual;
pub mod path;
pub mod writer;

use std::sync::Arc;
use std::time::Duration;

use evlog_config::EventLogConfig;
use evlog_core::entities::LogRecord;
use evlog_core::store::{ModelExtension, Store};
use evlog_core::tables::TableNames;
use tokio::task::JoinHandle;

use config_store::{ConfigStore, Snapshot};
pub use error::EventLogError;
pub use loader::LoadOutcome;
pub use logs::LogFilter;
pub use manual::EventOptions;

/// The audit engine. Register it with a store through [`EventLog::attach`].
#[derive(Debug)]
pub struct EventLog {
    names: TableNames,
    reload_interval: Option<Duration>,
    configs: ConfigStore,
}

impl EventLog {
    #[must_use]
    pub fn new(config: &EventLogConfig) -> Self {
        Self {
            names: config.table_names(),
            reload_interval: config.reload_interval(),
            configs: ConfigStore::new(),
        }
    }

    #[must_use]
    pub const fn table_names(&self) -> &TableNames {
        &self.names
    }

    /// Current configuration snapshot of `database`, if loaded.
    #[must_use]
    pub fn snapshot(&self, database: &str) -> Option<Arc<Snapshot>> {
        self.configs.snapshot(database)
    }

    /// Register as a model extension on `store` and load every database.
    ///
    /// # Errors
    ///
    /// Returns the first load error; see [`EventLog::load`].
    pub async fn attach(self: &Arc<Self>, store: &dyn Store) -> Result<(), EventLogError> {
        let extension: Arc<dyn ModelExtension> = Arc::<Self>::clone(self);
        store.register_extension(extension);
        self.load(store).await?;
        Ok(())
    }

    /// Load the configuration of every database in `store`. Databases
    /// without a log table are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error of any database. Databases before it are
    /// loaded, the failing one keeps its previous snapshot.
    pub async fn load(
        &self,
        store: &dyn Store,
    ) -> Result<Vec<(String, LoadOutcome)>, EventLogError> {
        let mut outcomes = Vec::new();
        for database in store.database_names() {
            let outcome =
                loader::load_database(store, &self.configs, &self.names, &database).await?;
            outcomes.push((database, outcome));
        }
        Ok(outcomes)
    }

    /// Reload every database, picking up entity and group changes.
    ///
    /// Query failures are logged and leave that database's previous
    /// snapshot in effect.
    ///
    /// # Errors
    ///
    /// Returns configuration and resolution errors.
    pub async fn reload(&self, store: &dyn Store) -> Result<(), EventLogError> {
        for database in store.database_names() {
            match loader::load_database(store, &self.configs, &self.names, &database).await {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!(database = %database, error = %err, "event log reload failed");
                }
            }
        }
        Ok(())
    }

    /// Reload on a fixed interval until the returned handle is aborted.
    /// Every error is logged; the loop never stops on its own.
    pub fn spawn_reload_loop(
        self: &Arc<Self>,
        store: Arc<dyn Store>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = engine.reload(store.as_ref()).await {
                    tracing::error!(error = %err, "periodic event log reload failed");
                }
            }
        })
    }

    /// Start the reload loop if a reload interval is configured.
    pub fn spawn_configured_reload(
        self: &Arc<Self>,
        store: Arc<dyn Store>,
    ) -> Option<JoinHandle<()>> {
        self.reload_interval
            .map(|interval| self.spawn_reload_loop(store, interval))
    }

    /// Record an event no lifecycle hook observed.
    ///
    /// # Errors
    ///
    /// Returns `EventLogError::NotRegistered` if `database` has not been
    /// loaded, or any error writing the entry.
    pub async fn record_event(
        &self,
        store: &dyn Store,
        database: &str,
        entity: &str,
        action: &str,
        options: EventOptions,
    ) -> Result<LogRecord, EventLogError> {
        if !self.configs.is_registered(database) {
            return Err(EventLogError::NotRegistered(database.to_string()));
        }
        manual::record_event(store, &self.names, database, entity, action, options).await
    }

    /// Query the log of `database`.
    ///
    /// # Errors
    ///
    /// Returns `EventLogError` if a query fails or a row cannot be parsed.
    pub async fn find_logs(
        &self,
        store: &dyn Store,
        database: &str,
        filter: &LogFilter,
    ) -> Result<Vec<LogRecord>, EventLogError> {
        logs::find_logs(store, &self.names, database, filter).await
    }
}
