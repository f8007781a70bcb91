//! Lifecycle extension registry.
//!
//! Extensions are asked once per entity whether they apply; the answer is
//! cached until the entity is re-evaluated. Dispatch runs the applicable
//! extensions in registration order and stops at the first failure.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use evlog_core::errors::StoreError;
use evlog_core::record::{EntityDescriptor, Record};
use evlog_core::store::{ModelExtension, Transaction};

/// Which lifecycle hook to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Insert,
    Update,
    Delete,
}

impl LifecycleEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Default)]
pub struct HookRegistry {
    extensions: RwLock<Vec<Arc<dyn ModelExtension>>>,
    applicable: RwLock<HashMap<EntityDescriptor, Vec<Arc<dyn ModelExtension>>>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        f.debug_struct("HookRegistry")
            .field("extensions", &names)
            .finish_non_exhaustive()
    }
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension. Cached applicability is cleared so every entity is
    /// asked again on its next mutation.
    pub fn register(&self, extension: Arc<dyn ModelExtension>) {
        tracing::debug!(extension = extension.name(), "registering model extension");
        self.extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(extension);
        self.applicable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn reevaluate(&self, entity: &EntityDescriptor) {
        self.applicable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity);
    }

    /// Extensions that apply to `entity`, computing and caching on a miss.
    ///
    /// A miss is resolved under the cache's write lock, so a concurrent
    /// `reevaluate` either precedes the computation or removes its result.
    #[must_use]
    pub fn applicable(&self, entity: &EntityDescriptor) -> Vec<Arc<dyn ModelExtension>> {
        if let Some(cached) = self
            .applicable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
        {
            return cached.clone();
        }

        let mut cache = self
            .applicable
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(entity) {
            return cached.clone();
        }
        let resolved: Vec<Arc<dyn ModelExtension>> = self
            .extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.is_applicable(entity))
            .cloned()
            .collect();
        cache.insert(entity.clone(), resolved.clone());
        resolved
    }

    /// Run the `event` hook of every applicable extension.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Hook` naming the first extension that failed.
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
        record: &Record,
        tx: &dyn Transaction,
    ) -> Result<(), StoreError> {
        for extension in self.applicable(record.descriptor()) {
            let result = match event {
                LifecycleEvent::Insert => extension.after_insert(record, tx).await,
                LifecycleEvent::Update => extension.after_update(record, tx).await,
                LifecycleEvent::Delete => extension.after_delete(record, tx).await,
            };
            if let Err(error) = result {
                tracing::warn!(
                    extension = extension.name(),
                    entity = %record.descriptor(),
                    event = event.as_str(),
                    error = %error,
                    "model extension failed"
                );
                return Err(StoreError::Hook {
                    extension: extension.name().to_string(),
                    error,
                });
            }
        }
        Ok(())
    }
}
