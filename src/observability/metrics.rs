//! # Metrics Collection
//!
//! Counters emitted through the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, describe_counter, Unit};

/// Metrics recorder for secret requests and resiliency activity.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record the outcome of one secret API request.
    pub fn record_secret_request(&self, store: &str, operation: &str, outcome: &str) {
        let labels = [
            ("store", store.to_string()),
            ("operation", operation.to_string()),
            ("outcome", outcome.to_string()),
        ];
        counter!("secret_requests_total", &labels).increment(1);
    }

    pub fn record_cache_hit(&self, store: &str) {
        counter!("secret_cache_hits_total", "store" => store.to_string()).increment(1);
    }

    pub fn record_cache_miss(&self, store: &str) {
        counter!("secret_cache_misses_total", "store" => store.to_string()).increment(1);
    }

    /// Record a single attempt made under a resiliency policy.
    pub fn record_attempt(&self, target: &str, outcome: &str) {
        let labels = [("target", target.to_string()), ("outcome", outcome.to_string())];
        counter!("resiliency_attempts_total", &labels).increment(1);
    }

    /// Record a circuit breaker moving into `state`.
    pub fn record_breaker_transition(&self, target: &str, state: &str) {
        let labels = [("target", target.to_string()), ("state", state.to_string())];
        counter!("resiliency_breaker_transitions_total", &labels).increment(1);
    }

    /// Describe every metric so exporters show help text before the first event.
    pub fn register_metrics(&self) {
        describe_counter!(
            "secret_requests_total",
            Unit::Count,
            "Secret API requests grouped by store, operation and outcome"
        );
        describe_counter!("secret_cache_hits_total", Unit::Count, "Secrets served from the cache");
        describe_counter!(
            "secret_cache_misses_total",
            Unit::Count,
            "Cache lookups that fell through to the store"
        );
        describe_counter!(
            "resiliency_attempts_total",
            Unit::Count,
            "Attempts made under a resiliency policy"
        );
        describe_counter!(
            "resiliency_breaker_transitions_total",
            Unit::Count,
            "Circuit breaker state transitions"
        );
    }
}
