//! Secrets API.
//!
//! Serves single and bulk secret reads against the configured stores. A read is
//! checked in a fixed order: any store configured at all, the named store exists,
//! the key is in scope, the cache (single reads only), then the backend call under
//! the store's resiliency policy. Bulk results are filtered by scope after the
//! fetch.

use super::cache::SecretCache;
use super::error::{Result, SecretsError};
use super::scope::{ScopeEvaluator, SecretsScope};
use super::types::{
    take_refresh_flag, GetBulkSecretRequest, GetBulkSecretResponse, GetSecretRequest,
    GetSecretResponse,
};
use crate::components::secretstores::{BulkSecretRequest, SecretRequest, SecretStore};
use crate::context::RequestContext;
use crate::errors::Error;
use crate::observability::MetricsRecorder;
use crate::resiliency::Resiliency;
use crate::secret_span;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

#[derive(Debug)]
struct StoreEntry {
    name: String,
    store: Box<dyn SecretStore>,
}

/// Orchestrates secret reads across the configured stores.
#[derive(Debug)]
pub struct SecretsApi {
    // Keyed by lower-cased store name.
    stores: HashMap<String, StoreEntry>,
    scopes: ScopeEvaluator,
    cache: SecretCache,
    resiliency: Arc<Resiliency>,
    metrics: MetricsRecorder,
}

impl SecretsApi {
    pub fn builder() -> SecretsApiBuilder {
        SecretsApiBuilder::default()
    }

    /// Configured store names, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.stores.values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    pub fn has_stores(&self) -> bool {
        !self.stores.is_empty()
    }

    pub fn cache(&self) -> &SecretCache {
        &self.cache
    }

    pub fn scopes(&self) -> &ScopeEvaluator {
        &self.scopes
    }

    pub fn resiliency(&self) -> &Resiliency {
        &self.resiliency
    }

    /// Read one secret.
    pub async fn get_secret(
        &self,
        ctx: &RequestContext,
        req: GetSecretRequest,
    ) -> Result<GetSecretResponse> {
        let span = secret_span!("get_secret", req.store_name, key = %req.key);
        let store_label = req.store_name.clone();

        let result = self.get_secret_inner(ctx, req).instrument(span).await;
        self.record("get_secret", &store_label, &result);
        result
    }

    async fn get_secret_inner(
        &self,
        ctx: &RequestContext,
        req: GetSecretRequest,
    ) -> Result<GetSecretResponse> {
        let entry = self.resolve_store(&req.store_name)?;
        let store = entry.name.as_str();

        if !self.scopes.is_allowed(store, &req.key) {
            debug!(store = %store, key = %req.key, "Secret access denied by scope");
            return Err(SecretsError::permission_denied(req.key, store));
        }

        let mut metadata = req.metadata;
        let refresh = take_refresh_flag(&mut metadata);
        let caching = self.cache.is_enabled(store).await;

        if caching && !refresh {
            if let Some(data) = self.cache.get(store, &req.key).await {
                debug!(store = %store, key = %req.key, "Serving secret from cache");
                self.metrics.record_cache_hit(store);
                return Ok(GetSecretResponse { data });
            }
            self.metrics.record_cache_miss(store);
        }

        let request = SecretRequest { name: req.key.clone(), metadata };
        let backend = entry.store.as_ref();
        let response = self
            .resiliency
            .run(ctx, store, || backend.get_secret(request.clone()))
            .await
            .map_err(|e| {
                warn!(store = %store, key = %req.key, error = %e, "Failed to get secret");
                SecretsError::get_secret(req.key.as_str(), store, e)
            })?;

        if caching {
            self.cache.put(store, &req.key, response.data.clone()).await;
        }

        Ok(GetSecretResponse { data: response.data })
    }

    /// Read every secret a store exposes, dropping names outside the store's scope.
    pub async fn get_bulk_secret(
        &self,
        ctx: &RequestContext,
        req: GetBulkSecretRequest,
    ) -> Result<GetBulkSecretResponse> {
        let span = secret_span!("get_bulk_secret", req.store_name);
        let store_label = req.store_name.clone();

        let result = self.get_bulk_secret_inner(ctx, req).instrument(span).await;
        self.record("get_bulk_secret", &store_label, &result);
        result
    }

    async fn get_bulk_secret_inner(
        &self,
        ctx: &RequestContext,
        req: GetBulkSecretRequest,
    ) -> Result<GetBulkSecretResponse> {
        let entry = self.resolve_store(&req.store_name)?;
        let store = entry.name.as_str();

        let mut metadata = req.metadata;
        take_refresh_flag(&mut metadata);

        let request = BulkSecretRequest { metadata };
        let backend = entry.store.as_ref();
        let response = self
            .resiliency
            .run(ctx, store, || backend.bulk_get_secret(request.clone()))
            .await
            .map_err(|e| {
                warn!(store = %store, error = %e, "Failed to get bulk secrets");
                SecretsError::bulk_get_secret(store, e)
            })?;

        let fetched = response.data.len();
        let data: HashMap<_, _> = response
            .data
            .into_iter()
            .filter(|(name, _)| self.scopes.is_allowed(store, name))
            .collect();
        if data.len() < fetched {
            debug!(
                store = %store,
                fetched,
                returned = data.len(),
                "Dropped bulk secrets outside scope"
            );
        }

        Ok(GetBulkSecretResponse { data })
    }

    /// Close every store concurrently, logging failures.
    pub async fn close(&self) {
        let closing = self.stores.values().map(|entry| async move {
            match entry.store.close().await {
                Ok(()) => debug!(store = %entry.name, "Closed secret store"),
                Err(e) => warn!(store = %entry.name, error = %e, "Failed to close secret store"),
            }
        });
        futures::future::join_all(closing).await;
    }

    fn resolve_store(&self, name: &str) -> Result<&StoreEntry> {
        if self.stores.is_empty() {
            return Err(SecretsError::NotConfigured);
        }
        self.stores
            .get(&name.to_lowercase())
            .ok_or_else(|| SecretsError::store_not_found(name))
    }

    fn record<T>(&self, operation: &str, store: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        self.metrics.record_secret_request(store, operation, outcome);
    }
}

/// Builder for [`SecretsApi`].
#[derive(Debug, Default)]
pub struct SecretsApiBuilder {
    stores: Vec<StoreEntry>,
    scopes: ScopeEvaluator,
    cache: SecretCache,
    resiliency: Option<Arc<Resiliency>>,
}

impl SecretsApiBuilder {
    /// Add an initialised store under its configured name.
    pub fn store(mut self, name: impl Into<String>, store: Box<dyn SecretStore>) -> Self {
        self.stores.push(StoreEntry { name: name.into(), store });
        self
    }

    pub fn scope(mut self, store: impl Into<String>, scope: SecretsScope) -> Self {
        self.scopes.insert(store, scope);
        self
    }

    pub fn scopes(mut self, scopes: ScopeEvaluator) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn cache(mut self, cache: SecretCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn resiliency(mut self, resiliency: impl Into<Arc<Resiliency>>) -> Self {
        self.resiliency = Some(resiliency.into());
        self
    }

    /// Fails when two stores share a name, ignoring case.
    pub fn build(self) -> std::result::Result<SecretsApi, Error> {
        let mut stores: HashMap<String, StoreEntry> = HashMap::with_capacity(self.stores.len());
        for entry in self.stores {
            let key = entry.name.to_lowercase();
            if let Some(existing) = stores.get(&key) {
                return Err(Error::validation_field(
                    format!(
                        "Secret store '{}' conflicts with already configured store '{}'",
                        entry.name, existing.name
                    ),
                    "components",
                ));
            }
            stores.insert(key, entry);
        }

        let metrics = MetricsRecorder::new();
        metrics.register_metrics();
        info!(stores = stores.len(), scopes = self.scopes.len(), "Secrets API ready");

        Ok(SecretsApi {
            stores,
            scopes: self.scopes,
            cache: self.cache,
            resiliency: self.resiliency.unwrap_or_default(),
            metrics,
        })
    }
}
