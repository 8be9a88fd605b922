//! # Configuration Management
//!
//! The runtime document: application identity, component definitions, secret
//! scopes, resiliency policies and logging settings.

pub mod resiliency;
pub mod settings;

pub use resiliency::{
    CircuitBreakerConfig, ComponentPolicyNames, PoliciesConfig, PolicyNames, ResiliencyConfig,
    RetryConfig, RetryKind, TargetsConfig,
};
pub use settings::{
    ComponentConfig, ObservabilityConfig, RuntimeConfig, SecretsConfig, SecretsScopeConfig,
    ENV_PREFIX,
};
