//! Common test utilities for all integration tests.
//!
//! Secret store doubles with call accounting, plus helpers for building
//! resiliency policies from YAML.

#![allow(dead_code)]

use async_trait::async_trait;
use sidecar_secrets::components::{
    BulkSecretRequest, BulkSecretResponse, Metadata, SecretData, SecretRequest, SecretResponse,
    SecretStore, StoreError,
};
use sidecar_secrets::config::ResiliencyConfig;
use sidecar_secrets::resiliency::Resiliency;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GOOD_KEY: &str = "good-key";
pub const ERROR_KEY: &str = "error-key";
pub const GOOD_VALUE: &str = "life is good";

/// Store with fixed answers: `good-key` succeeds, `error-key` fails, anything
/// else is an empty success. Every `get_secret` call is counted.
#[derive(Debug, Clone, Default)]
pub struct FakeSecretStore {
    calls: Arc<AtomicUsize>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of `get_secret` calls, usable after the store is boxed.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn boxed(&self) -> Box<dyn SecretStore> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn init(&mut self, _metadata: &Metadata) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match req.name.as_str() {
            GOOD_KEY => Ok(SecretResponse { data: good_secret() }),
            ERROR_KEY => Err(StoreError::backend("error occurs with error-key")),
            _ => Ok(SecretResponse::default()),
        }
    }

    async fn bulk_get_secret(
        &self,
        _req: BulkSecretRequest,
    ) -> Result<BulkSecretResponse, StoreError> {
        Ok(BulkSecretResponse { data: HashMap::from([(GOOD_KEY.to_string(), good_secret())]) })
    }
}

pub fn good_secret() -> SecretData {
    SecretData::from([(GOOD_KEY.to_string(), GOOD_VALUE.to_string())])
}

/// Scripted failures keyed by secret name.
#[derive(Debug, Default)]
pub struct Failure {
    fails: Mutex<HashMap<String, usize>>,
    timeouts: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl Failure {
    /// `fails[key]` calls for `key` fail before it succeeds; `timeouts[key]` makes
    /// every call for `key` sleep that long first.
    pub fn new(fails: HashMap<String, usize>, timeouts: HashMap<String, Duration>) -> Self {
        Self { fails: Mutex::new(fails), timeouts, calls: Mutex::default() }
    }

    pub async fn perform(&self, key: &str) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(key.to_string()).or_default() += 1;

        if let Some(delay) = self.timeouts.get(key) {
            tokio::time::sleep(*delay).await;
            return Ok(());
        }

        let mut fails = self.fails.lock().unwrap();
        match fails.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::backend(format!("forced failure for {key}")))
            }
            _ => Ok(()),
        }
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

/// Store that fails or stalls according to a [`Failure`]. Bulk calls use the
/// `key` metadata entry as the failure key.
#[derive(Debug, Clone)]
pub struct FailingSecretStore {
    pub failure: Arc<Failure>,
}

impl FailingSecretStore {
    pub fn new(failure: Failure) -> Self {
        Self { failure: Arc::new(failure) }
    }

    pub fn boxed(&self) -> Box<dyn SecretStore> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl SecretStore for FailingSecretStore {
    async fn init(&mut self, _metadata: &Metadata) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError> {
        self.failure.perform(&req.name).await?;
        Ok(SecretResponse { data: SecretData::from([(req.name.clone(), req.name)]) })
    }

    async fn bulk_get_secret(
        &self,
        req: BulkSecretRequest,
    ) -> Result<BulkSecretResponse, StoreError> {
        let key = req.metadata.get("key").cloned().unwrap_or_default();
        self.failure.perform(&key).await?;
        Ok(BulkSecretResponse {
            data: HashMap::from([(key.clone(), SecretData::from([(key.clone(), key)]))]),
        })
    }
}

pub fn resiliency_from_yaml(yaml: &str) -> Resiliency {
    let config: ResiliencyConfig = serde_yaml::from_str(yaml).unwrap();
    Resiliency::from_config(&config).unwrap()
}

/// One retry 10ms apart and a 100ms per-attempt timeout for `failSecret`.
pub const FAIL_SECRET_POLICIES: &str = r#"
policies:
  retries:
    singleRetry: { policy: constant, duration: 10ms, maxRetries: 1 }
    tenRetries: { policy: constant, duration: 10ms, maxRetries: 10 }
  timeouts:
    fast: 100ms
  circuitBreakers:
    simpleCB: { maxRequests: 1, timeout: 1s, trip: "consecutiveFailures > 4" }
targets:
  components:
    failSecret:
      outbound: { retry: singleRetry, timeout: fast }
"#;
