//! Startup sequence for the secrets runtime
//!
//! Turns a validated [`RuntimeConfig`] and a populated store registry into a
//! ready [`SecretsApi`]:
//! - builds the resiliency policies and their bindings
//! - creates, templates and initialises every configured secret store
//! - enables caching for stores that ask for it
//! - loads the access scopes

use crate::components::metadata::MetadataResolver;
use crate::components::secretstores::{SecretStore, SecretStoreRegistry};
use crate::config::RuntimeConfig;
use crate::errors::{Error, Result};
use crate::resiliency::Resiliency;
use crate::secrets::{ScopeEvaluator, SecretCache, SecretsApi};
use std::collections::HashMap;
use tracing::{debug, info, warn};

type NamedStore = (String, Box<dyn SecretStore>);

/// Initialise every configured secret store and assemble the secrets API.
///
/// If any step fails, every store created so far is closed before the error
/// is returned.
pub async fn build_secrets_api(
    config: &RuntimeConfig,
    registry: &SecretStoreRegistry,
) -> Result<SecretsApi> {
    let resiliency = Resiliency::from_config(&config.resiliency)?;
    check_distinct_store_names(config)?;

    let cache = SecretCache::new();
    let mut stores: Vec<NamedStore> = Vec::new();
    if let Err(e) = init_stores(config, registry, &resiliency, &cache, &mut stores).await {
        close_stores(stores).await;
        return Err(e);
    }

    for scope in &config.secrets.scopes {
        if !config.secret_stores().any(|c| c.name == scope.store_name) {
            warn!(store = %scope.store_name, "Secret scope refers to an unconfigured store");
        }
    }

    stores
        .into_iter()
        .fold(SecretsApi::builder(), |builder, (name, store)| builder.store(name, store))
        .scopes(ScopeEvaluator::from_config(&config.secrets.scopes))
        .cache(cache)
        .resiliency(resiliency)
        .build()
}

/// Store names are looked up ignoring case, so they must stay distinct that way.
fn check_distinct_store_names(config: &RuntimeConfig) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for component in config.secret_stores() {
        if let Some(existing) = seen.insert(component.name.to_lowercase(), &component.name) {
            return Err(Error::validation_field(
                format!(
                    "Secret store '{}' conflicts with already configured store '{}'",
                    component.name, existing
                ),
                "components",
            ));
        }
    }
    Ok(())
}

/// Create and initialise each store, pushing it onto `stores` as soon as it exists
/// so the caller can release it on failure.
async fn init_stores(
    config: &RuntimeConfig,
    registry: &SecretStoreRegistry,
    resiliency: &Resiliency,
    cache: &SecretCache,
    stores: &mut Vec<NamedStore>,
) -> Result<()> {
    let resolver = MetadataResolver::new(
        config.app_id.clone(),
        config.namespace.clone(),
        config.pod_name.clone(),
    );

    for component in config.secret_stores() {
        let factory =
            registry.resolve(&component.component_type, &component.version).ok_or_else(|| {
                Error::component(
                    component.name.clone(),
                    format!(
                        "couldn't find secret store {}/{}",
                        component.component_type, component.version
                    ),
                )
            })?;

        let metadata = resolver.resolve(&component.metadata)?;
        let mut store = factory();
        let initialised = store.init(&metadata).await;
        stores.push((component.name.clone(), store));
        initialised.map_err(|e| {
            Error::component(component.name.clone(), format!("failed to init: {}", e))
        })?;

        let cached = cache.init_for_store(&component.name, &metadata).await.map_err(|e| {
            Error::component(component.name.clone(), format!("invalid cache settings: {}", e))
        })?;

        info!(
            store = %component.name,
            component_type = %component.component_type,
            version = %component.version,
            cached,
            resiliency = resiliency.has_policy(&component.name),
            "Initialised secret store"
        );
    }
    Ok(())
}

async fn close_stores(stores: Vec<NamedStore>) {
    for (name, store) in stores {
        match store.close().await {
            Ok(()) => debug!(store = %name, "Closed secret store after failed startup"),
            Err(e) => warn!(store = %name, error = %e, "Failed to close secret store"),
        }
    }
}
