//! Built-in secret stores.
//!
//! Local development stores that need no external service. Production stores
//! are registered by the embedding process through the same registry.

pub mod env;
pub mod file;

pub use env::EnvSecretStore;
pub use file::FileSecretStore;

use crate::components::secretstores::{SecretStore, SecretStoreRegistry};
use tracing::info;

/// Register every built-in store with `registry`.
pub fn register_builtin(registry: &SecretStoreRegistry) {
    registry.register(|| Box::new(EnvSecretStore::new()) as Box<dyn SecretStore>, &["local.env"]);
    registry.register(
        || Box::new(FileSecretStore::new()) as Box<dyn SecretStore>,
        &["local.file"],
    );
    info!(kind = registry.kind(), "Registered built-in secret stores");
}
