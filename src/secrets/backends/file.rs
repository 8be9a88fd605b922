//! JSON file secret store (development only).
//!
//! Component type `secretstores.local.file`. The file named by the `secretsFile`
//! metadata entry is loaded once at init. Nested objects are flattened into
//! `outer<sep>inner` names, where the separator comes from `nestedSeparator`
//! (default `:`). Non-string values are returned as JSON text.

use crate::components::secretstores::{
    BulkSecretRequest, BulkSecretResponse, Metadata, SecretData, SecretRequest, SecretResponse,
    SecretStore, StoreError,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub const SECRETS_FILE_KEY: &str = "secretsFile";
pub const NESTED_SEPARATOR_KEY: &str = "nestedSeparator";
pub const DEFAULT_NESTED_SEPARATOR: &str = ":";

#[derive(Debug, Clone, Default)]
pub struct FileSecretStore {
    secrets: HashMap<String, String>,
}

impl FileSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an already parsed JSON document.
    pub fn from_json(document: &Value, separator: &str) -> Result<Self, StoreError> {
        let Value::Object(root) = document else {
            return Err(StoreError::invalid_metadata("secrets file must contain a JSON object"));
        };

        let mut secrets = HashMap::new();
        for (key, value) in root {
            flatten(key, value, separator, &mut secrets);
        }
        Ok(Self { secrets })
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

fn flatten(prefix: &str, value: &Value, separator: &str, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(&format!("{prefix}{separator}{key}"), nested, separator, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn init(&mut self, metadata: &Metadata) -> Result<(), StoreError> {
        let path = metadata
            .get(SECRETS_FILE_KEY)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::invalid_metadata("missing local secrets file in metadata"))?;
        let separator = metadata
            .get(NESTED_SEPARATOR_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_NESTED_SEPARATOR);

        let raw = tokio::fs::read_to_string(path).await?;
        let document: Value = serde_json::from_str(&raw)?;
        *self = Self::from_json(&document, separator)?;

        debug!(path = %path, secrets = self.secrets.len(), "Loaded local secrets file");
        Ok(())
    }

    async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError> {
        match self.secrets.get(&req.name) {
            Some(value) => {
                Ok(SecretResponse { data: SecretData::from([(req.name.clone(), value.clone())]) })
            }
            None => Err(StoreError::not_found(req.name)),
        }
    }

    async fn bulk_get_secret(
        &self,
        _req: BulkSecretRequest,
    ) -> Result<BulkSecretResponse, StoreError> {
        let data = self
            .secrets
            .iter()
            .map(|(name, value)| {
                (name.clone(), SecretData::from([(name.clone(), value.clone())]))
            })
            .collect();
        Ok(BulkSecretResponse { data })
    }
}
