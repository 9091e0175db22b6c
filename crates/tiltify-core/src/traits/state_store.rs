// # State Store Trait
//
// Defines the interface for the durable document store holding delivery state.
//
// ## Purpose
//
// The state store makes delivery survive restarts by tracking, per campaign:
// - `/tiltify/{campaignId}/lastId`: the resume cursor
// - `/tiltify/{campaignId}/ids`: identifiers already delivered
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based (JSON document): `FileStateStore`
//
// ## Usage
//
// ```rust,ignore
// use tiltify_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     match store.get("/tiltify/42/lastId").await {
//         Ok(value) => println!("resume after {value}"),
//         Err(e) if e.is_not_found() => println!("first run"),
//         Err(e) => return Err(e.into()),
//     }
//
//     store.set("/tiltify/42/lastId", serde_json::json!(9)).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::StateStoreConfig;

/// Trait for state store implementations
///
/// Values live in a JSON document tree addressed by slash-separated paths
/// (`/a/b/c`). Intermediate objects are created on write.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Implement locking/concurrency control for thread safety
/// - ✅ Cache state in memory for performance (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn background tasks without clear lifecycle
/// - ❌ Implement delivery logic (owned by `PollEngine`)
/// - ❌ Call the donation source (owned by `PollEngine`)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the value at `path`
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The stored value
    /// - `Err(Error::NotFound)`: Nothing stored at this path
    /// - `Err(Error)`: Storage error
    async fn get(&self, path: &str) -> Result<Value, crate::Error>;

    /// Create or replace the value at `path`
    async fn set(&self, path: &str, value: Value) -> Result<(), crate::Error>;

    /// Append `value` to the array at `path`
    ///
    /// Creates the array if nothing is stored at `path`. Fails with a state
    /// store error if the existing value is not an array.
    async fn append(&self, path: &str, value: Value) -> Result<(), crate::Error>;

    /// Remove the value at `path`
    ///
    /// Succeeds if nothing was stored there.
    async fn delete(&self, path: &str) -> Result<(), crate::Error>;

    /// Apply several `set`s as one update
    ///
    /// Readers observe either none or all of `entries`. File-backed stores
    /// persist them with a single write.
    async fn commit(&self, entries: Vec<(String, Value)>) -> Result<(), crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures
    /// all changes are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this state store
    ///
    /// # Returns
    ///
    /// A shared StateStore trait object
    async fn create(&self, config: &StateStoreConfig)
    -> Result<Arc<dyn StateStore>, crate::Error>;
}
