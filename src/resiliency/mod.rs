//! # Resiliency Policies
//!
//! Named timeout, retry and circuit-breaker policies, bound to the components
//! the runtime calls out to. [`Resiliency`] is built once from configuration;
//! each bound target owns a single breaker shared by all concurrent calls.

pub mod breaker;
pub mod duration;
pub mod error;
pub mod policy;
pub mod retry;

pub use breaker::{BreakerSettings, BreakerState, CircuitBreaker, Counts, TripExpression};
pub use duration::parse_duration;
pub use error::{PolicyConfigError, PolicyError};
pub use policy::PolicyDefinition;
pub use retry::{Backoff, BackoffPolicy, RetryPolicy};

use crate::config::{CircuitBreakerConfig, PolicyNames, ResiliencyConfig, RetryConfig, RetryKind};
use crate::context::RequestContext;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolved policies and their bindings.
#[derive(Debug, Default)]
pub struct Resiliency {
    components: HashMap<String, Arc<PolicyDefinition>>,
}

impl Resiliency {
    /// No bindings: every target runs unprotected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every named policy and bind it to its targets.
    pub fn from_config(config: &ResiliencyConfig) -> Result<Self, PolicyConfigError> {
        let timeouts = config
            .policies
            .timeouts
            .iter()
            .map(|(name, value)| Ok((name.as_str(), parse_duration(value)?)))
            .collect::<Result<HashMap<_, _>, PolicyConfigError>>()?;

        let retries = config
            .policies
            .retries
            .iter()
            .map(|(name, retry)| Ok((name.as_str(), build_retry(name, retry)?)))
            .collect::<Result<HashMap<_, _>, PolicyConfigError>>()?;

        let breakers = config
            .policies
            .circuit_breakers
            .iter()
            .map(|(name, cb)| Ok((name.as_str(), build_breaker(name, cb)?)))
            .collect::<Result<HashMap<_, _>, PolicyConfigError>>()?;

        let mut components = HashMap::new();
        for (target, bindings) in &config.targets.components {
            let PolicyNames { timeout, retry, circuit_breaker } = &bindings.outbound;

            let timeout = lookup(&timeouts, target, "timeout", timeout.as_deref())?.copied();
            let retry = lookup(&retries, target, "retry", retry.as_deref())?.cloned();
            let breaker = lookup(&breakers, target, "circuitBreaker", circuit_breaker.as_deref())?
                .map(|settings| Arc::new(CircuitBreaker::new(settings.clone(), target.clone())));

            debug!(
                policy_target = %target,
                timeout = ?timeout,
                retry = bindings.outbound.retry.as_deref().unwrap_or(""),
                circuit_breaker = bindings.outbound.circuit_breaker.as_deref().unwrap_or(""),
                "Bound resiliency policies"
            );
            components.insert(
                target.clone(),
                Arc::new(PolicyDefinition::new(target.clone(), timeout, retry, breaker)),
            );
        }

        Ok(Self { components })
    }

    /// Policies for calls made to component `name`; unprotected when unbound.
    pub fn component_outbound_policy(&self, name: &str) -> Arc<PolicyDefinition> {
        self.components
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::new(PolicyDefinition::unprotected(name)))
    }

    pub fn has_policy(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Names of every bound target, sorted.
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<_> = self.components.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Run `operation` against component `target` under its outbound policies.
    pub async fn run<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        target: &str,
        operation: F,
    ) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.component_outbound_policy(target).run(ctx, operation).await
    }
}

fn lookup<'a, V>(
    policies: &'a HashMap<&str, V>,
    target: &str,
    kind: &'static str,
    name: Option<&str>,
) -> Result<Option<&'a V>, PolicyConfigError> {
    match name {
        None => Ok(None),
        Some(name) => policies.get(name).map(Some).ok_or_else(|| {
            PolicyConfigError::UnknownPolicy {
                target: target.to_string(),
                kind,
                policy: name.to_string(),
            }
        }),
    }
}

fn optional_duration(
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, PolicyConfigError> {
    value.map(parse_duration).transpose().map(|d| d.unwrap_or(default))
}

fn build_retry(name: &str, config: &RetryConfig) -> Result<RetryPolicy, PolicyConfigError> {
    let invalid = |reason: String| PolicyConfigError::InvalidRetry { name: name.to_string(), reason };

    let max_retries = match config.max_retries {
        None | Some(-1) => None,
        Some(n) if n < -1 => return Err(invalid(format!("maxRetries must be -1 or more, got {n}"))),
        Some(n) => Some(
            u32::try_from(n).map_err(|_| invalid(format!("maxRetries {n} is too large")))?,
        ),
    };

    let backoff = match config.policy {
        RetryKind::Constant => BackoffPolicy::Constant {
            duration: optional_duration(
                config.duration.as_deref(),
                retry::DEFAULT_CONSTANT_DURATION,
            )?,
        },
        RetryKind::Exponential => {
            let multiplier = config.multiplier.unwrap_or(retry::DEFAULT_MULTIPLIER);
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid(format!("multiplier must be at least 1, got {multiplier}")));
            }
            let randomization_factor =
                config.randomization_factor.unwrap_or(retry::DEFAULT_RANDOMIZATION_FACTOR);
            if !(0.0..=1.0).contains(&randomization_factor) {
                return Err(invalid(format!(
                    "randomizationFactor must be between 0 and 1, got {randomization_factor}"
                )));
            }
            BackoffPolicy::Exponential {
                initial_interval: optional_duration(
                    config.initial_interval.as_deref(),
                    retry::DEFAULT_INITIAL_INTERVAL,
                )?,
                multiplier,
                max_interval: optional_duration(
                    config.max_interval.as_deref(),
                    retry::DEFAULT_MAX_INTERVAL,
                )?,
                randomization_factor,
            }
        }
    };

    Ok(RetryPolicy { backoff, max_retries })
}

fn build_breaker(
    name: &str,
    config: &CircuitBreakerConfig,
) -> Result<BreakerSettings, PolicyConfigError> {
    let trip = TripExpression::parse(config.trip.as_deref().unwrap_or(breaker::DEFAULT_TRIP))?;
    let mut settings = BreakerSettings::new(name, trip);
    settings.max_requests = config.max_requests.unwrap_or(breaker::DEFAULT_MAX_REQUESTS);
    settings.interval = optional_duration(config.interval.as_deref(), Duration::ZERO)?;
    settings.timeout = optional_duration(config.timeout.as_deref(), breaker::DEFAULT_TIMEOUT)?;
    if settings.timeout.is_zero() {
        return Err(PolicyConfigError::InvalidCircuitBreaker {
            name: name.to_string(),
            reason: "timeout must be greater than zero".to_string(),
        });
    }
    Ok(settings)
}
