//! Shared test utilities for evlog-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use evlog_core::record::{EntityDescriptor, Record};
    use evlog_core::store::{ModelExtension, Transaction};
    use evlog_core::value::Value;
    use tempfile::TempDir;

    use crate::LibsqlStore;

    pub const BLOG_SCHEMA: &str = "
        CREATE TABLE article (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft'
        );
        CREATE TABLE comment (
            id INTEGER PRIMARY KEY,
            id_article INTEGER NOT NULL REFERENCES article(id) ON DELETE CASCADE,
            body TEXT
        );
        CREATE TABLE tag (
            slug TEXT PRIMARY KEY
        );
        CREATE TABLE article_tag (
            id_article INTEGER NOT NULL REFERENCES article(id) ON DELETE CASCADE,
            id_tag TEXT NOT NULL REFERENCES tag(slug) ON DELETE CASCADE,
            PRIMARY KEY (id_article, id_tag)
        );
        CREATE TABLE note (
            id INTEGER PRIMARY KEY,
            text TEXT
        );
    ";

    /// A store with one logical database `main` holding the blog schema.
    /// Keep the `TempDir` alive for the duration of the test.
    pub async fn blog_store() -> (TempDir, LibsqlStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.db");
        let store = LibsqlStore::new();
        store.attach("main", path.to_str().unwrap()).await.unwrap();
        store.execute_batch("main", BLOG_SCHEMA).await.unwrap();
        (dir, store)
    }

    enum Mode {
        Record,
        Fail,
        Write(String),
    }

    /// Extension recording `"<event> <entity> [columns]"` lines.
    pub struct RecordingExtension {
        name: String,
        entity: String,
        mode: Mode,
        enabled: AtomicBool,
        events: Mutex<Vec<String>>,
    }

    impl RecordingExtension {
        fn build(name: &str, entity: &str, mode: Mode) -> Self {
            Self {
                name: name.into(),
                entity: entity.into(),
                mode,
                enabled: AtomicBool::new(true),
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn for_entity(entity: &str) -> Self {
            Self::build("recording", entity, Mode::Record)
        }

        pub fn failing(entity: &str) -> Self {
            Self::build("failing", entity, Mode::Fail)
        }

        /// Writes one row into `table` from every hook.
        pub fn writing(entity: &str, table: &str) -> Self {
            Self::build("writing", entity, Mode::Write(table.into()))
        }

        pub fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        async fn handle(
            &self,
            event: &str,
            columns: Vec<String>,
            record: &Record,
            tx: &dyn Transaction,
        ) -> anyhow::Result<()> {
            match &self.mode {
                Mode::Fail => anyhow::bail!("refusing {event}"),
                Mode::Write(table) => {
                    tx.insert_row(
                        table,
                        &[("text".to_string(), Value::from(format!("{event} {}", record.descriptor())))],
                    )
                    .await?;
                }
                Mode::Record => {}
            }
            self.events.lock().unwrap().push(format!(
                "{event} {} [{}]",
                record.descriptor(),
                columns.join(", ")
            ));
            Ok(())
        }
    }

    #[async_trait]
    impl ModelExtension for RecordingExtension {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_applicable(&self, entity: &EntityDescriptor) -> bool {
            self.enabled.load(Ordering::SeqCst) && entity.name == self.entity
        }

        async fn after_insert(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
            self.handle("insert", record.persisted_columns(), record, tx)
                .await
        }

        async fn after_update(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
            self.handle("update", record.changed_columns(), record, tx)
                .await
        }

        async fn after_delete(&self, record: &Record, tx: &dyn Transaction) -> anyhow::Result<()> {
            self.handle("delete", record.persisted_columns(), record, tx)
                .await
        }
    }
}
