//! Pluggable component plumbing
//!
//! Components (secret stores today) are selected at runtime by type name and
//! version. New backends are added by registering a factory; nothing in the
//! request path needs to change.

pub mod metadata;
pub mod registry;
pub mod secretstores;

pub use metadata::{contains_namespace, MetadataError, MetadataResolver};
pub use registry::{is_initial_version, Factory, Registry, RegistryError};
pub use secretstores::{
    BulkSecretRequest, BulkSecretResponse, Metadata, SecretData, SecretRequest, SecretResponse,
    SecretStore, SecretStoreRegistry, StoreError, SECRET_STORE_KIND,
};
