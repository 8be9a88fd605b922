//! Component metadata templating
//!
//! Expands placeholder tokens inside component metadata values before the
//! component is initialised.

use super::secretstores::Metadata;
use thiserror::Error;
use tracing::debug;

const UUID_TOKEN: &str = "{uuid}";
const POD_NAME_TOKEN: &str = "{podName}";
const NAMESPACE_TOKEN: &str = "{namespace}";
const APP_ID_TOKEN: &str = "{appID}";

/// Errors raised while expanding metadata placeholders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// A value refers to `{podName}` but the runtime has no pod name.
    #[error("property {property} refers to {{podName}} but podName is not set")]
    MissingPodName { property: String },
}

/// Resolves metadata placeholders using the runtime's identity.
#[derive(Debug, Clone, Default)]
pub struct MetadataResolver {
    app_id: String,
    namespace: String,
    pod_name: Option<String>,
}

impl MetadataResolver {
    pub fn new(
        app_id: impl Into<String>,
        namespace: Option<String>,
        pod_name: Option<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            namespace: namespace.unwrap_or_default(),
            pod_name: pod_name.filter(|p| !p.is_empty()),
        }
    }

    /// Expand every placeholder in `metadata`, returning a new map.
    ///
    /// Each `{uuid}` occurrence gets its own identifier.
    pub fn resolve(&self, metadata: &Metadata) -> Result<Metadata, MetadataError> {
        metadata
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.resolve_value(name, value)?)))
            .collect()
    }

    fn resolve_value(&self, property: &str, value: &str) -> Result<String, MetadataError> {
        let mut val = value.to_string();
        while let Some(pos) = val.find(UUID_TOKEN) {
            val.replace_range(pos..pos + UUID_TOKEN.len(), &uuid::Uuid::new_v4().to_string());
        }

        if val.contains(POD_NAME_TOKEN) {
            let pod_name = self
                .pod_name
                .as_deref()
                .ok_or_else(|| MetadataError::MissingPodName { property: property.to_string() })?;
            val = val.replace(POD_NAME_TOKEN, pod_name);
        }

        val = val.replace(NAMESPACE_TOKEN, &format!("{}.{}", self.namespace, self.app_id));
        val = val.replace(APP_ID_TOKEN, &self.app_id);

        if val != value {
            debug!(property = %property, "Expanded metadata placeholders");
        }
        Ok(val)
    }
}

/// Reports whether any metadata value references `{namespace}`.
pub fn contains_namespace(metadata: &Metadata) -> bool {
    metadata.values().any(|v| v.contains(NAMESPACE_TOKEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn resolver() -> MetadataResolver {
        MetadataResolver::new("checkout", Some("prod".to_string()), Some("checkout-0".to_string()))
    }

    #[test]
    fn test_expands_identity_tokens() {
        let resolved = resolver()
            .resolve(&metadata(&[
                ("consumerID", "{appID}-{podName}"),
                ("queue", "{namespace}"),
                ("plain", "value"),
            ]))
            .unwrap();

        assert_eq!(resolved["consumerID"], "checkout-checkout-0");
        assert_eq!(resolved["queue"], "prod.checkout");
        assert_eq!(resolved["plain"], "value");
    }

    #[test]
    fn test_each_uuid_is_unique() {
        let resolved = resolver().resolve(&metadata(&[("id", "{uuid}/{uuid}")])).unwrap();
        let (first, second) = resolved["id"].split_once('/').unwrap();

        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(first).is_ok());
        assert!(uuid::Uuid::parse_str(second).is_ok());
    }

    #[test]
    fn test_missing_pod_name_is_an_error() {
        let resolver = MetadataResolver::new("checkout", None, None);
        let err = resolver.resolve(&metadata(&[("consumerID", "{podName}")])).unwrap_err();

        assert_eq!(err, MetadataError::MissingPodName { property: "consumerID".to_string() });
    }

    #[test]
    fn test_contains_namespace() {
        assert!(contains_namespace(&metadata(&[("a", "x"), ("b", "{namespace}-y")])));
        assert!(!contains_namespace(&metadata(&[("a", "{appID}")])));
    }
}
