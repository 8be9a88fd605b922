//! Secret store capability
//!
//! Defines the interface every secret store backend implements, the request and
//! response shapes exchanged with it, and the registry type used to resolve stores
//! by component type.

use super::registry::Registry;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Component kind prefix for secret stores (`secretstores.<name>`).
pub const SECRET_STORE_KIND: &str = "secretstores";

/// Free-form string metadata passed to components and backend calls.
pub type Metadata = HashMap<String, String>;

/// Map of secret name to secret value(s) for a single secret.
pub type SecretData = HashMap<String, String>;

/// Registry of secret store factories.
pub type SecretStoreRegistry = Registry<Box<dyn SecretStore>>;

/// Request to fetch a single secret from a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretRequest {
    pub name: String,
    pub metadata: Metadata,
}

/// A single secret as returned by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretResponse {
    pub data: SecretData,
}

/// Request to fetch every secret a backend exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSecretRequest {
    pub metadata: Metadata,
}

/// All secrets a backend exposes, keyed by secret name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSecretResponse {
    pub data: HashMap<String, SecretData>,
}

/// Errors reported by secret store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Secret does not exist in the backend.
    #[error("secret not found: {key}")]
    NotFound { key: String },

    /// Component metadata is missing or malformed.
    #[error("invalid metadata: {message}")]
    InvalidMetadata { message: String },

    /// Backend-specific failure.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// I/O error while reading the backend's source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed backend payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an invalid metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata { message: message.into() }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }
}

/// Trait for secret store backends
///
/// Implementations must be Send + Sync; one initialised instance serves every
/// concurrent request for its store.
#[async_trait]
pub trait SecretStore: Send + Sync + std::fmt::Debug {
    /// Initialise the store from its (already templated) component metadata.
    async fn init(&mut self, metadata: &Metadata) -> Result<(), StoreError>;

    /// Fetch one secret by name.
    async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError>;

    /// Fetch every secret the store exposes.
    async fn bulk_get_secret(
        &self,
        req: BulkSecretRequest,
    ) -> Result<BulkSecretResponse, StoreError>;

    /// Release backend resources.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct StaticStore {
        value: String,
    }

    #[async_trait]
    impl SecretStore for StaticStore {
        async fn init(&mut self, metadata: &Metadata) -> Result<(), StoreError> {
            self.value = metadata
                .get("value")
                .cloned()
                .ok_or_else(|| StoreError::invalid_metadata("missing value"))?;
            Ok(())
        }

        async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError> {
            Ok(SecretResponse { data: HashMap::from([(req.name, self.value.clone())]) })
        }

        async fn bulk_get_secret(
            &self,
            _req: BulkSecretRequest,
        ) -> Result<BulkSecretResponse, StoreError> {
            Ok(BulkSecretResponse::default())
        }
    }

    #[tokio::test]
    async fn test_registry_produces_initialisable_store() {
        let registry = SecretStoreRegistry::new(SECRET_STORE_KIND);
        registry.register(|| Box::new(StaticStore::default()) as Box<dyn SecretStore>, &["static"]);

        let mut store = registry.create("secretstores.static", "v1").unwrap();
        store.init(&Metadata::from([("value".to_string(), "s3cr3t".to_string())])).await.unwrap();

        let resp = store
            .get_secret(SecretRequest { name: "db".to_string(), metadata: Metadata::new() })
            .await
            .unwrap();
        assert_eq!(resp.data.get("db").map(String::as_str), Some("s3cr3t"));
        assert!(store.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_init_rejects_missing_metadata() {
        let mut store = StaticStore::default();
        let err = store.init(&Metadata::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidMetadata { .. }));
        assert_eq!(err.to_string(), "invalid metadata: missing value");
    }
}
