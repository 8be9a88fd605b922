//! Component factory registry
//!
//! Maps `(kind, name, version)` to a factory producing a component instance.
//! The same registry type serves every pluggable component kind; the kind only
//! contributes the `"<kind>."` prefix of the fully-qualified name.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Factory producing a fresh component instance.
pub type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Errors returned while resolving a component.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No factory is registered under the name and version.
    #[error("couldn't find {kind} {full_name}/{version}")]
    NotFound { kind: String, full_name: String, version: String },
}

/// Returns true when `version` denotes the initial (unversioned) release of a component.
pub fn is_initial_version(version: &str) -> bool {
    let v = version.to_lowercase();
    v.is_empty() || v == "v0" || v == "v1"
}

/// Registry of component factories for one component kind.
///
/// Registration may happen concurrently while plugins load; lookups never block
/// each other.
pub struct Registry<T> {
    kind: &'static str,
    factories: DashMap<String, Factory<T>>,
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("components", &self.registered_names())
            .finish()
    }
}

impl<T> Registry<T> {
    /// Create an empty registry for the given component kind (e.g. `"secretstores"`).
    pub fn new(kind: &'static str) -> Self {
        Self { kind, factories: DashMap::new() }
    }

    /// The component kind this registry serves.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register a factory under one or more case-insensitive names.
    ///
    /// A name may carry a version suffix (`"vault/v2"`). Registering an already
    /// known name replaces the previous factory.
    pub fn register<F>(&self, factory: F, names: &[&str])
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Factory<T> = Arc::new(factory);
        for name in names {
            let full_name = self.full_name(name);
            info!(component = %full_name, "Registering component");
            if self.factories.insert(full_name.clone(), Arc::clone(&factory)).is_some() {
                debug!(component = %full_name, "Replaced previously registered component");
            }
        }
    }

    /// Look up the factory for a fully-qualified component type and version.
    ///
    /// Tries `name/version` first; for the initial version, falls back to the bare name.
    pub fn resolve(&self, name: &str, version: &str) -> Option<Factory<T>> {
        let name_lower = name.to_lowercase();
        let version_lower = version.to_lowercase();

        if let Some(factory) = self.factories.get(&format!("{}/{}", name_lower, version_lower)) {
            return Some(Arc::clone(factory.value()));
        }
        if is_initial_version(&version_lower) {
            if let Some(factory) = self.factories.get(&name_lower) {
                return Some(Arc::clone(factory.value()));
            }
        }
        None
    }

    /// Instantiate a component by fully-qualified type and version.
    pub fn create(&self, name: &str, version: &str) -> Result<T, RegistryError> {
        match self.resolve(name, version) {
            Some(factory) => Ok(factory()),
            None => Err(RegistryError::NotFound {
                kind: self.kind.to_string(),
                full_name: name.to_lowercase(),
                version: version.to_lowercase(),
            }),
        }
    }

    /// Fully-qualified names currently registered, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}.{}", self.kind, name).to_lowercase()
    }
}
