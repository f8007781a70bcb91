//! What the engine asks of its store
//!
//! A delegating store records the calls that cross the `Store` trait:
//! - Log queries are ordered and limited by the store
//! - Removed identifiers have their applicability decision dropped

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use evlog_config::EventLogConfig;
use evlog_core::errors::StoreError;
use evlog_core::query::{Order, RawRecord, RelationRole, TraversalQuery};
use evlog_core::record::{EntityDescriptor, Record};
use evlog_core::store::{ModelExtension, Store, Transaction};
use evlog_core::tables::TableNames;
use evlog_db::LibsqlStore;
use evlog_engine::{EventLog, EventOptions, LogFilter};

/// Delegates to a libSQL store and remembers traversals and reevaluations.
struct RecordingStore {
    inner: LibsqlStore,
    queries: Mutex<Vec<TraversalQuery>>,
    reevaluated: Mutex<Vec<EntityDescriptor>>,
}

impl RecordingStore {
    fn log_queries(&self) -> Vec<TraversalQuery> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.root == TableNames::default().log)
            .cloned()
            .collect()
    }

    fn reevaluated(&self) -> Vec<String> {
        self.reevaluated
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }
}

#[async_trait]
impl Store for RecordingStore {
    fn database_names(&self) -> Vec<String> {
        self.inner.database_names()
    }

    async fn has_table(&self, database: &str, table: &str) -> Result<bool, StoreError> {
        Store::has_table(&self.inner, database, table).await
    }

    fn set_accessor_name(
        &self,
        database: &str,
        role: RelationRole,
        name: &str,
    ) -> Result<(), StoreError> {
        Store::set_accessor_name(&self.inner, database, role, name)
    }

    async fn find_raw(
        &self,
        database: &str,
        query: &TraversalQuery,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.queries.lock().unwrap().push(query.clone());
        Store::find_raw(&self.inner, database, query).await
    }

    async fn begin(&self, database: &str) -> Result<Box<dyn Transaction>, StoreError> {
        Store::begin(&self.inner, database).await
    }

    fn register_extension(&self, extension: Arc<dyn ModelExtension>) {
        Store::register_extension(&self.inner, extension);
    }

    fn reevaluate_entity(&self, entity: &EntityDescriptor) {
        self.reevaluated.lock().unwrap().push(entity.clone());
        Store::reevaluate_entity(&self.inner, entity);
    }
}

async fn recording(configuration: &str) -> (TempDir, Arc<RecordingStore>, Arc<EventLog>) {
    let dir = TempDir::new().unwrap();
    let inner = LibsqlStore::new();
    inner
        .attach("main", dir.path().join("main.db").to_str().unwrap())
        .await
        .unwrap();
    inner
        .execute_batch(
            "main",
            "CREATE TABLE article (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
             CREATE TABLE comment (
                 id INTEGER PRIMARY KEY,
                 id_article INTEGER NOT NULL REFERENCES article(id)
             );",
        )
        .await
        .unwrap();
    inner
        .install_event_log_tables("main", &TableNames::default())
        .await
        .unwrap();
    if !configuration.is_empty() {
        inner.execute_batch("main", configuration).await.unwrap();
    }

    let store = Arc::new(RecordingStore {
        inner,
        queries: Mutex::new(Vec::new()),
        reevaluated: Mutex::new(Vec::new()),
    });
    let engine = Arc::new(EventLog::new(&EventLogConfig::default()));
    engine.attach(store.as_ref()).await.unwrap();
    (dir, store, engine)
}

#[tokio::test]
async fn log_queries_are_ordered_and_limited_by_the_store() {
    let (_dir, store, engine) =
        recording(r#"INSERT INTO "eventLogEntity" (id, identifier) VALUES (1, 'article');"#).await;
    for title in ["first", "second", "third"] {
        let mut article = Record::new("main", "article").with("title", title);
        store.inner.insert(&mut article).await.unwrap();
    }

    let newest = engine
        .find_logs(
            store.as_ref(),
            "main",
            &LogFilter {
                limit: Some(1),
                ..LogFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].affected.id, Some(3));

    let queries = store.log_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].order,
        Some(Order {
            column: "id".into(),
            descending: true,
        })
    );
    assert_eq!(queries[0].limit, Some(1));

    let everything = engine
        .find_logs(store.as_ref(), "main", &LogFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(store.log_queries()[1].limit, Some(100));
}

#[tokio::test]
async fn source_entity_filters_still_honor_the_limit() {
    let (_dir, store, engine) = recording("").await;
    for id in 1..=3 {
        engine
            .record_event(
                store.as_ref(),
                "main",
                "article",
                "import",
                EventOptions {
                    source_entity: Some("feed".into()),
                    id: Some(id),
                    ..EventOptions::default()
                },
            )
            .await
            .unwrap();
    }

    let found = engine
        .find_logs(
            store.as_ref(),
            "main",
            &LogFilter {
                source_entity: Some("feed".into()),
                limit: Some(2),
                ..LogFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        found.iter().map(|r| r.affected.id).collect::<Vec<_>>(),
        vec![Some(3), Some(2)]
    );
    let query = store.log_queries().pop().unwrap();
    assert!(query.order.is_some_and(|o| o.descending));
    assert_eq!(query.limit, None);
}

#[tokio::test]
async fn removed_identifiers_are_reevaluated() {
    let (_dir, store, engine) = recording(
        r#"INSERT INTO "eventLogEntity" (id, identifier) VALUES (1, 'article'), (2, 'comment');"#,
    )
    .await;
    store.reevaluated.lock().unwrap().clear();

    store
        .inner
        .execute_batch(
            "main",
            r#"DELETE FROM "eventLogEntity" WHERE identifier = 'comment';"#,
        )
        .await
        .unwrap();
    engine.reload(store.as_ref()).await.unwrap();

    let reevaluated = store.reevaluated();
    assert!(reevaluated.contains(&"comment".to_string()));
    assert!(reevaluated.contains(&"article".to_string()));
}
