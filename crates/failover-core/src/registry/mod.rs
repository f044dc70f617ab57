//! Plugin-based record store registry
//!
//! The registry allows record stores to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use failover_core::registry::StoreRegistry;
//! use failover_core::config::RecordStoreConfig;
//!
//! let registry = StoreRegistry::new();
//! failover_provider_cloudflare::register(&registry);
//!
//! let config = RecordStoreConfig::Cloudflare { ... };
//! let store = registry.create_store(&config)?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In failover-provider-cloudflare crate
//! pub fn register(registry: &StoreRegistry) {
//!     registry.register_store("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::config::RecordStoreConfig;
use crate::error::{Error, Result};
use crate::traits::{RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of record store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Poisoned locks are recovered.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Box<dyn RecordStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating store instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>> {
        let store_type = config.type_name();
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown record store type: {}", store_type)))?;

        factory.create(config)
    }

    /// List all registered store types, sorted
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
