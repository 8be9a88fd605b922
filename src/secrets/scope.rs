//! Access scopes.
//!
//! A scope restricts which keys may be read from one store. Stores without a
//! scope are unrestricted. A non-empty allow list is authoritative; otherwise the
//! deny list is consulted, then the default access.

use crate::config::SecretsScopeConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Access applied to keys not named in either list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    #[default]
    #[serde(alias = "Allow")]
    Allow,
    #[serde(alias = "Deny")]
    Deny,
}

/// Access rules for a single store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretsScope {
    pub default_access: AccessPolicy,
    pub allowed_secrets: HashSet<String>,
    pub denied_secrets: HashSet<String>,
}

impl SecretsScope {
    pub fn new(default_access: AccessPolicy) -> Self {
        Self { default_access, ..Default::default() }
    }

    pub fn allow<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_secrets.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn deny<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_secrets.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_secret_allowed(&self, key: &str) -> bool {
        if !self.allowed_secrets.is_empty() {
            return self.allowed_secrets.contains(key);
        }
        if self.denied_secrets.contains(key) {
            return false;
        }
        self.default_access == AccessPolicy::Allow
    }
}

impl From<&SecretsScopeConfig> for SecretsScope {
    fn from(config: &SecretsScopeConfig) -> Self {
        Self::new(config.default_access)
            .allow(config.allowed_secrets.iter().cloned())
            .deny(config.denied_secrets.iter().cloned())
    }
}

/// Scopes for every configured store, keyed by store name.
#[derive(Debug, Clone, Default)]
pub struct ScopeEvaluator {
    scopes: HashMap<String, SecretsScope>,
}

impl ScopeEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[SecretsScopeConfig]) -> Self {
        Self {
            scopes: configs.iter().map(|c| (c.store_name.clone(), SecretsScope::from(c))).collect(),
        }
    }

    pub fn insert(&mut self, store: impl Into<String>, scope: SecretsScope) {
        self.scopes.insert(store.into(), scope);
    }

    pub fn scope(&self, store: &str) -> Option<&SecretsScope> {
        self.scopes.get(store)
    }

    pub fn is_allowed(&self, store: &str, key: &str) -> bool {
        self.scopes.get(store).map_or(true, |scope| scope.is_secret_allowed(key))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
