//! # Resiliency Configuration
//!
//! Named policies and the targets they are bound to, as written in the
//! `resiliency` section of the runtime document. Values are kept as written;
//! [`crate::resiliency::Resiliency::from_config`] parses and checks them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResiliencyConfig {
    pub policies: PoliciesConfig,
    pub targets: TargetsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoliciesConfig {
    /// Timeout name to duration string, e.g. `fast: 100ms`.
    pub timeouts: HashMap<String, String>,
    pub retries: HashMap<String, RetryConfig>,
    pub circuit_breakers: HashMap<String, CircuitBreakerConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryKind {
    #[default]
    Constant,
    Exponential,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub policy: RetryKind,
    /// Wait between attempts for constant policies.
    pub duration: Option<String>,
    pub initial_interval: Option<String>,
    pub multiplier: Option<f64>,
    pub max_interval: Option<String>,
    pub randomization_factor: Option<f64>,
    /// `-1` (or absent) retries until the caller gives up.
    pub max_retries: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitBreakerConfig {
    pub max_requests: Option<u32>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub trip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetsConfig {
    /// Component name to the policies applied to calls made to it.
    pub components: HashMap<String, ComponentPolicyNames>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentPolicyNames {
    pub outbound: PolicyNames,
}

/// Names of the policies bound to one direction of a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyNames {
    pub timeout: Option<String>,
    pub retry: Option<String>,
    pub circuit_breaker: Option<String>,
}

impl PolicyNames {
    pub fn is_empty(&self) -> bool {
        self.timeout.is_none() && self.retry.is_none() && self.circuit_breaker.is_none()
    }
}
