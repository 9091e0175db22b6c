// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple, fast state store that doesn't persist across restarts.
// Useful for testing, or deployments where re-delivering donations after a
// restart is harmless.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First tick after a restart requests the full donation list again and
//   re-emits every donation
//
// ## When to Use
//
// - Testing environments
// - Consumers that deduplicate on `donationId` themselves

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::document;
use crate::config::StateStoreConfig;
use crate::traits::state_store::{StateStore, StateStoreFactory};
use crate::Error;

/// In-memory state store implementation
///
/// This implementation keeps the document behind a RwLock.
/// It provides no persistence across restarts.
///
/// # Example
///
/// ```rust,no_run
/// use tiltify_core::state::MemoryStateStore;
/// use tiltify_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     store.set("/tiltify/42/lastId", serde_json::json!(9)).await?;
///     assert_eq!(store.get("/tiltify/42/lastId").await?, serde_json::json!(9));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Value>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::with_document(document::empty())
    }

    /// Create a store pre-populated with `document`
    pub fn with_document(document: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(document)),
        }
    }

    /// Copy of the whole document
    pub async fn snapshot(&self) -> Value {
        self.inner.read().await.clone()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner
            .read()
            .await
            .as_object()
            .is_none_or(|map| map.is_empty())
    }

    /// Clear all values from the store
    pub async fn clear(&self) {
        *self.inner.write().await = document::empty();
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, path: &str) -> Result<Value, Error> {
        let guard = self.inner.read().await;
        document::get(&guard, path).cloned()
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        document::set(&mut guard, path, value)
    }

    async fn append(&self, path: &str, value: Value) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        document::append(&mut guard, path, value)
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        document::delete(&mut guard, path)
    }

    async fn commit(&self, entries: Vec<(String, Value)>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        // Apply to a copy so a bad path leaves the document untouched
        let mut next = guard.clone();
        for (path, value) in entries {
            document::set(&mut next, &path, value)?;
        }
        *guard = next;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for [`MemoryStateStore`]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Arc<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::Memory => Ok(Arc::new(MemoryStateStore::new())),
            _ => Err(Error::config("Invalid config for memory state store")),
        }
    }
}
