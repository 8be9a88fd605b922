//! Environment variable secret store (development only).
//!
//! Component type `secretstores.local.env`. A secret named `db-password` is read
//! from the variable `<prefix>db-password`, where `prefix` comes from component
//! metadata and defaults to empty. Read-only.

use crate::components::secretstores::{
    BulkSecretRequest, BulkSecretResponse, Metadata, SecretData, SecretRequest, SecretResponse,
    SecretStore, StoreError,
};
use async_trait::async_trait;
use std::env;

/// Metadata key naming the variable prefix.
pub const PREFIX_KEY: &str = "prefix";

#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn single(name: String, value: String) -> SecretData {
        SecretData::from([(name, value)])
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn init(&mut self, metadata: &Metadata) -> Result<(), StoreError> {
        self.prefix = metadata.get(PREFIX_KEY).cloned().unwrap_or_default();
        Ok(())
    }

    async fn get_secret(&self, req: SecretRequest) -> Result<SecretResponse, StoreError> {
        let variable = format!("{}{}", self.prefix, req.name);
        match env::var(&variable) {
            Ok(value) => Ok(SecretResponse { data: Self::single(req.name, value) }),
            Err(env::VarError::NotPresent) => Err(StoreError::not_found(req.name)),
            Err(env::VarError::NotUnicode(_)) => Err(StoreError::backend(format!(
                "environment variable {} is not valid unicode",
                variable
            ))),
        }
    }

    async fn bulk_get_secret(
        &self,
        _req: BulkSecretRequest,
    ) -> Result<BulkSecretResponse, StoreError> {
        let data = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(self.prefix.as_str())?.to_string();
                (!name.is_empty()).then(|| (name.clone(), Self::single(name, value)))
            })
            .collect();
        Ok(BulkSecretResponse { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_secret_with_prefix() {
        env::set_var("SIDECAR_TEST_ENV_STORE_db-password", "hunter2");

        let mut store = EnvSecretStore::new();
        let metadata =
            Metadata::from([(PREFIX_KEY.to_string(), "SIDECAR_TEST_ENV_STORE_".to_string())]);
        store.init(&metadata).await.unwrap();

        let resp = store
            .get_secret(SecretRequest { name: "db-password".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(resp.data["db-password"], "hunter2");

        let err = store
            .get_secret(SecretRequest { name: "missing".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        env::remove_var("SIDECAR_TEST_ENV_STORE_db-password");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_unicode_value_is_backend_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        env::set_var("SIDECAR_TEST_ENV_RAW_blob", OsStr::from_bytes(&[0x66, 0x6f, 0x80]));

        let store = EnvSecretStore::with_prefix("SIDECAR_TEST_ENV_RAW_");
        let err = store
            .get_secret(SecretRequest { name: "blob".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }), "got {err:?}");

        env::remove_var("SIDECAR_TEST_ENV_RAW_blob");
    }

    #[tokio::test]
    async fn test_bulk_strips_prefix() {
        env::set_var("SIDECAR_TEST_ENV_BULK_one", "1");
        env::set_var("SIDECAR_TEST_ENV_BULK_two", "2");

        let store = EnvSecretStore::with_prefix("SIDECAR_TEST_ENV_BULK_");
        let resp = store.bulk_get_secret(BulkSecretRequest::default()).await.unwrap();

        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data["one"]["one"], "1");
        assert_eq!(resp.data["two"]["two"], "2");

        env::remove_var("SIDECAR_TEST_ENV_BULK_one");
        env::remove_var("SIDECAR_TEST_ENV_BULK_two");
    }
}
