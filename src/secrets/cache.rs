//! Per-store secret cache.
//!
//! Caching is switched on per store when the store is initialised and never
//! toggled afterwards. Entries have no expiry; a refreshed read overwrites them.

use crate::components::secretstores::{Metadata, SecretData, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Component metadata key that enables caching for a store.
pub const CACHE_ENABLE_KEY: &str = "cacheEnable";

type StoreEntries = HashMap<String, SecretData>;

/// Cache of single-secret responses keyed by store and secret name.
#[derive(Debug, Clone, Default)]
pub struct SecretCache {
    // Present only for stores with caching enabled.
    stores: Arc<RwLock<HashMap<String, StoreEntries>>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable caching for `store` if its metadata asks for it.
    ///
    /// Returns whether caching is enabled. An unparsable `cacheEnable` value is an
    /// error rather than silently leaving the store uncached.
    pub async fn init_for_store(
        &self,
        store: &str,
        metadata: &Metadata,
    ) -> Result<bool, StoreError> {
        let enabled = match metadata.get(CACHE_ENABLE_KEY) {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| {
                StoreError::invalid_metadata(format!(
                    "{} must be a boolean, got '{}'",
                    CACHE_ENABLE_KEY, value
                ))
            })?,
        };

        if enabled {
            self.stores.write().await.entry(store.to_string()).or_default();
            debug!(store = %store, "Secret caching enabled");
        }
        Ok(enabled)
    }

    pub async fn is_enabled(&self, store: &str) -> bool {
        self.stores.read().await.contains_key(store)
    }

    /// Cached value for `key`, if the store is cached and an entry exists.
    pub async fn get(&self, store: &str, key: &str) -> Option<SecretData> {
        self.stores.read().await.get(store).and_then(|entries| entries.get(key)).cloned()
    }

    /// Store or overwrite an entry; ignored for uncached stores.
    pub async fn put(&self, store: &str, key: &str, value: SecretData) {
        if let Some(entries) = self.stores.write().await.get_mut(store) {
            entries.insert(key.to_string(), value);
        }
    }

    /// Number of entries held for `store`.
    pub async fn len(&self, store: &str) -> usize {
        self.stores.read().await.get(store).map_or(0, HashMap::len)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
