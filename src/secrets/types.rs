//! Request and response types for the secrets API.

use crate::components::secretstores::{Metadata, SecretData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved metadata key; the value `"true"` bypasses the cache for one read.
pub const REFRESH_CACHE_KEY: &str = "refreshCache";

/// Request for one secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSecretRequest {
    pub store_name: String,
    pub key: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GetSecretRequest {
    pub fn new(store_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self { store_name: store_name.into(), key: key.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Force a backend read and overwrite any cached value.
    pub fn with_refresh(self) -> Self {
        self.with_metadata(REFRESH_CACHE_KEY, "true")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSecretResponse {
    pub data: SecretData,
}

/// Request for every secret a store exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBulkSecretRequest {
    pub store_name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GetBulkSecretRequest {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self { store_name: store_name.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBulkSecretResponse {
    pub data: HashMap<String, SecretData>,
}

/// Remove the refresh flag, reporting whether a refresh was requested.
pub(crate) fn take_refresh_flag(metadata: &mut Metadata) -> bool {
    metadata.remove(REFRESH_CACHE_KEY).is_some_and(|value| value == "true")
}
