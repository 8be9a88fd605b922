//! # Configuration Settings
//!
//! Defines the runtime document for the sidecar secrets runtime.

use super::resiliency::ResiliencyConfig;
use crate::components::secretstores::{Metadata, SECRET_STORE_KIND};
use crate::errors::{Error, Result};
use crate::secrets::scope::AccessPolicy;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use validator::Validate;

/// Environment prefix for overrides, e.g. `SIDECAR_SECRETS_APP_ID`.
pub const ENV_PREFIX: &str = "SIDECAR_SECRETS";

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Identity of the application this sidecar serves
    #[validate(length(min = 1, message = "App id cannot be empty"))]
    pub app_id: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub pod_name: Option<String>,

    /// Component definitions; secret stores have a `secretstores.*` type
    #[serde(default)]
    #[validate(nested)]
    pub components: Vec<ComponentConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub resiliency: ResiliencyConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl RuntimeConfig {
    /// Load a YAML document from `path`, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Io {
            source: e,
            context: format!("Failed to read configuration file {}", path.display()),
        })?;

        let mut config: Self = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document without consulting the environment.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        let mut names = HashSet::new();
        for component in &self.components {
            if !names.insert(component.name.as_str()) {
                return Err(Error::validation_field(
                    format!("Duplicate component name '{}'", component.name),
                    "components",
                ));
            }
        }

        let mut scoped = HashSet::new();
        for scope in &self.secrets.scopes {
            if !scoped.insert(scope.store_name.as_str()) {
                return Err(Error::validation_field(
                    format!("Secret store '{}' has more than one scope", scope.store_name),
                    "secrets.scopes",
                ));
            }
        }

        Ok(())
    }

    /// Scalar settings from `SIDECAR_SECRETS_*` variables, read through the `config` crate.
    fn apply_env_overrides(&mut self) -> Result<()> {
        let env = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"),
            )
            .build()?;

        if let Some(app_id) = optional(env.get_string("app_id"))? {
            self.app_id = app_id;
        }
        if let Some(namespace) = optional(env.get_string("namespace"))? {
            self.namespace = Some(namespace);
        }
        if let Some(pod_name) = optional(env.get_string("pod_name"))? {
            self.pod_name = Some(pod_name);
        }
        if let Some(level) = optional(env.get_string("observability.log_level"))? {
            self.observability.log_level = level;
        }
        if let Some(json) = optional(env.get_bool("observability.json_logging"))? {
            self.observability.json_logging = json;
        }
        if let Some(name) = optional(env.get_string("observability.service_name"))? {
            self.observability.service_name = name;
        }
        Ok(())
    }

    /// Components whose type names a secret store.
    pub fn secret_stores(&self) -> impl Iterator<Item = &ComponentConfig> {
        self.components.iter().filter(|c| c.is_secret_store())
    }
}

fn optional<T>(value: std::result::Result<T, config::ConfigError>) -> Result<Option<T>> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A component definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    #[validate(length(min = 1, message = "Component name cannot be empty"))]
    pub name: String,

    /// Component type, e.g. `secretstores.local.file`
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Component type cannot be empty"))]
    pub component_type: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

impl ComponentConfig {
    pub fn is_secret_store(&self) -> bool {
        self.component_type
            .to_lowercase()
            .strip_prefix(SECRET_STORE_KIND)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Metadata values are strings; YAML booleans and numbers are accepted as written.
fn deserialize_metadata<'de, D>(deserializer: D) -> std::result::Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, serde_yaml::Value> = HashMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(D::Error::custom(format!(
                        "metadata value for '{}' must be a scalar",
                        key
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsConfig {
    #[validate(nested)]
    pub scopes: Vec<SecretsScopeConfig>,
}

/// Access rules for one secret store
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SecretsScopeConfig {
    #[validate(length(min = 1, message = "Scope store name cannot be empty"))]
    pub store_name: String,

    #[serde(default)]
    pub default_access: AccessPolicy,

    #[serde(default)]
    pub allowed_secrets: Vec<String>,

    #[serde(default)]
    pub denied_secrets: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    pub json_logging: bool,

    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            service_name: crate::APP_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOCUMENT: &str = r#"
appId: checkout
namespace: default
components:
  - name: local-secrets
    type: secretstores.local.file
    version: v1
    metadata:
      secretsFile: /etc/secrets.json
      cacheEnable: true
  - name: state
    type: state.redis
secrets:
  scopes:
    - storeName: local-secrets
      defaultAccess: deny
      allowedSecrets: [db-password]
observability:
  logLevel: debug
"#;

    #[test]
    fn test_parse_document() {
        let config = RuntimeConfig::from_yaml_str(DOCUMENT).unwrap();

        assert_eq!(config.app_id, "checkout");
        assert_eq!(config.namespace.as_deref(), Some("default"));
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.components[0].metadata["secretsFile"], "/etc/secrets.json");
        assert_eq!(config.components[0].metadata["cacheEnable"], "true");
        assert_eq!(config.secrets.scopes[0].default_access, AccessPolicy::Deny);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.service_name, crate::APP_NAME);

        let stores: Vec<_> = config.secret_stores().map(|c| c.name.as_str()).collect();
        assert_eq!(stores, vec!["local-secrets"]);
    }

    #[test]
    fn test_empty_app_id_rejected() {
        let err = RuntimeConfig::from_yaml_str("appId: \"\"").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_duplicate_component_names_rejected() {
        let raw = r#"
appId: app
components:
  - { name: store, type: secretstores.local.env }
  - { name: store, type: secretstores.local.file }
"#;
        let err = RuntimeConfig::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("Duplicate component name"));
    }

    #[test]
    fn test_empty_component_type_rejected() {
        let raw = "appId: app\ncomponents:\n  - { name: store, type: \"\" }\n";
        assert!(matches!(
            RuntimeConfig::from_yaml_str(raw).unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn test_one_scope_per_store() {
        let raw = r#"
appId: app
secrets:
  scopes:
    - storeName: store
    - storeName: store
"#;
        let err = RuntimeConfig::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("more than one scope"));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = RuntimeConfig::from_yaml_str("appId: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_secret_store_type_detection() {
        let component = |t: &str| ComponentConfig { component_type: t.into(), ..Default::default() };
        assert!(component("secretstores.local.env").is_secret_store());
        assert!(component("SecretStores.Local.Env").is_secret_store());
        assert!(!component("secretstoresfoo").is_secret_store());
        assert!(!component("state.redis").is_secret_store());
    }

    #[test]
    fn test_load_applies_environment_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"appId: from-file\n").unwrap();

        std::env::set_var("SIDECAR_SECRETS_POD_NAME", "pod-7d9f");
        std::env::set_var("SIDECAR_SECRETS_OBSERVABILITY__JSON_LOGGING", "true");
        let config = RuntimeConfig::load(file.path());
        std::env::remove_var("SIDECAR_SECRETS_POD_NAME");
        std::env::remove_var("SIDECAR_SECRETS_OBSERVABILITY__JSON_LOGGING");

        let config = config.unwrap();
        assert_eq!(config.app_id, "from-file");
        assert_eq!(config.pod_name.as_deref(), Some("pod-7d9f"));
        assert!(config.observability.json_logging);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RuntimeConfig::load("/nonexistent/sidecar.yaml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
