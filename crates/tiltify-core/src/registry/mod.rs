//! Plugin-based component registry
//!
//! The registry allows donation sources and state stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tiltify_core::registry::ComponentRegistry;
//!
//! // Create a registry with the built-in state stores
//! let registry = ComponentRegistry::with_builtin_state_stores();
//!
//! // Register donation sources
//! tiltify_api::register(&registry);
//!
//! // Create components from config
//! let store = registry.create_state_store(&config.state_store).await?;
//! let factory = registry.donation_source_factory("tiltify")?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In tiltify-api crate
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_donation_source("tiltify", Arc::new(TiltifyClientFactory));
//! }
//! ```

use crate::config::StateStoreConfig;
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{DonationSourceFactory, StateStore, StateStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Component registry for plugin-based creation
///
/// The registry maintains maps of type names to factory objects,
/// allowing dynamic instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered donation source factories
    sources: RwLock<HashMap<String, Arc<dyn DonationSourceFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

// Writers only insert, so a poisoned map is still consistent
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` state stores registered
    pub fn with_builtin_state_stores() -> Self {
        let registry = Self::new();
        registry.register_state_store("memory", Arc::new(MemoryStateStoreFactory));
        registry.register_state_store("file", Arc::new(FileStateStoreFactory));
        registry
    }

    /// Register a donation source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "tiltify")
    /// - `factory`: Factory object for creating source instances
    pub fn register_donation_source(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn DonationSourceFactory>,
    ) {
        write(&self.sources).insert(name.into(), factory);
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn StateStoreFactory>,
    ) {
        write(&self.state_stores).insert(name.into(), factory);
    }

    /// Get the factory registered under `name`
    ///
    /// # Returns
    ///
    /// - `Ok(factory)`: Registered factory
    /// - `Err(Error::Config)`: If no source is registered under `name`
    pub fn donation_source_factory(&self, name: &str) -> Result<Arc<dyn DonationSourceFactory>> {
        read(&self.sources)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown donation source type: {}", name)))
    }

    /// Create a state store from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: State store configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Arc<dyn StateStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = read(&self.state_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered donation source types
    pub fn list_donation_sources(&self) -> Vec<String> {
        read(&self.sources).keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        read(&self.state_stores).keys().cloned().collect()
    }

    /// Check if a donation source type is registered
    pub fn has_donation_source(&self, name: &str) -> bool {
        read(&self.sources).contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        read(&self.state_stores).contains_key(name)
    }
}
