//! Circuit breaker.
//!
//! A breaker counts attempt outcomes for one target. While closed every attempt
//! runs; once the trip expression holds it opens and rejects attempts for its
//! timeout, then lets up to `max_requests` trial attempts through while
//! half-open. Enough consecutive trial successes close it again; any trial
//! failure re-opens it.
//!
//! Outcomes are tagged with the generation they started in so that results from
//! attempts that straddle a state change do not skew the new counts.

use super::error::PolicyConfigError;
use crate::observability::MetricsRecorder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_MAX_REQUESTS: u32 = 1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TRIP: &str = "consecutiveFailures > 5";

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z]+)\s*(>=|<=|==|!=|>|<)\s*(\d+)\s*$").expect("valid regex")
});

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::HalfOpen => "half-open",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    Requests,
    TotalSuccesses,
    TotalFailures,
    ConsecutiveSuccesses,
    ConsecutiveFailures,
}

impl Variable {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "requests" => Some(Self::Requests),
            "totalSuccesses" => Some(Self::TotalSuccesses),
            "totalFailures" => Some(Self::TotalFailures),
            "consecutiveSuccesses" => Some(Self::ConsecutiveSuccesses),
            "consecutiveFailures" => Some(Self::ConsecutiveFailures),
            _ => None,
        }
    }

    fn read(&self, counts: &Counts) -> u32 {
        match self {
            Self::Requests => counts.requests,
            Self::TotalSuccesses => counts.total_successes,
            Self::TotalFailures => counts.total_failures,
            Self::ConsecutiveSuccesses => counts.consecutive_successes,
            Self::ConsecutiveFailures => counts.consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparison {
    variable: Variable,
    operator: Operator,
    value: u32,
}

impl Comparison {
    fn eval(&self, counts: &Counts) -> bool {
        let lhs = self.variable.read(counts);
        match self.operator {
            Operator::Gt => lhs > self.value,
            Operator::Ge => lhs >= self.value,
            Operator::Lt => lhs < self.value,
            Operator::Le => lhs <= self.value,
            Operator::Eq => lhs == self.value,
            Operator::Ne => lhs != self.value,
        }
    }
}

/// Condition over [`Counts`] that trips a closed breaker open.
///
/// Grammar: comparisons `<variable> <op> <integer>` joined by `&&` and `||`,
/// with `&&` binding tighter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripExpression {
    source: String,
    any_of: Vec<Vec<Comparison>>,
}

impl TripExpression {
    pub fn parse(expression: &str) -> Result<Self, PolicyConfigError> {
        let invalid = |reason: String| PolicyConfigError::InvalidTripExpression {
            expression: expression.to_string(),
            reason,
        };

        let mut any_of = Vec::new();
        for disjunct in expression.split("||") {
            let mut all_of = Vec::new();
            for term in disjunct.split("&&") {
                let caps = COMPARISON
                    .captures(term)
                    .ok_or_else(|| invalid(format!("cannot parse '{}'", term.trim())))?;
                let variable = Variable::parse(&caps[1])
                    .ok_or_else(|| invalid(format!("unknown variable '{}'", &caps[1])))?;
                let operator = match &caps[2] {
                    ">" => Operator::Gt,
                    ">=" => Operator::Ge,
                    "<" => Operator::Lt,
                    "<=" => Operator::Le,
                    "==" => Operator::Eq,
                    _ => Operator::Ne,
                };
                let value = caps[3]
                    .parse()
                    .map_err(|_| invalid(format!("value '{}' out of range", &caps[3])))?;
                all_of.push(Comparison { variable, operator, value });
            }
            any_of.push(all_of);
        }

        Ok(Self { source: expression.trim().to_string(), any_of })
    }

    pub fn eval(&self, counts: &Counts) -> bool {
        self.any_of.iter().any(|all_of| all_of.iter().all(|c| c.eval(counts)))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Static breaker settings.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    /// Trial attempts allowed while half-open; also the successes needed to close.
    pub max_requests: u32,
    /// Closed-state period after which counts reset; zero never resets.
    pub interval: Duration,
    /// Time spent open before probing.
    pub timeout: Duration,
    pub trip: TripExpression,
}

impl BreakerSettings {
    pub fn new(name: impl Into<String>, trip: TripExpression) -> Self {
        Self {
            name: name.into(),
            max_requests: DEFAULT_MAX_REQUESTS,
            interval: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            trip,
        }
    }
}

/// Why an attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Open,
    TooManyRequests,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Circuit breaker shared by every call on one target.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    target: String,
    inner: Mutex<Inner>,
    metrics: MetricsRecorder,
}

impl CircuitBreaker {
    pub fn new(mut settings: BreakerSettings, target: impl Into<String>) -> Self {
        if settings.max_requests == 0 {
            settings.max_requests = DEFAULT_MAX_REQUESTS;
        }
        let breaker = Self {
            settings,
            target: target.into(),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: None,
            }),
            metrics: MetricsRecorder::new(),
        };
        {
            let mut inner = breaker.lock();
            breaker.new_generation(&mut inner, Instant::now());
        }
        breaker
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Admit an attempt, returning the generation its outcome must be reported against.
    pub fn before_request(&self) -> Result<u64, Rejection> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());

        match inner.state {
            BreakerState::Open => return Err(Rejection::Open),
            BreakerState::HalfOpen if inner.counts.requests >= self.settings.max_requests => {
                return Err(Rejection::TooManyRequests);
            }
            _ => {}
        }
        inner.counts.on_request();
        Ok(inner.generation)
    }

    /// Record the outcome of an attempt admitted in `generation`.
    pub fn after_request(&self, generation: u64, success: bool) {
        let now = Instant::now();
        let mut inner = self.lock();
        self.refresh(&mut inner, now);
        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if inner.state == BreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.max_requests
            {
                self.transition(&mut inner, BreakerState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match inner.state {
                BreakerState::Closed if self.settings.trip.eval(&inner.counts) => {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
                BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Open, now),
                _ => {}
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            BreakerState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, state: BreakerState, now: Instant) {
        if inner.state == state {
            return;
        }
        let previous = inner.state;
        inner.state = state;
        self.new_generation(inner, now);

        if state == BreakerState::Open {
            warn!(
                breaker = %self.settings.name,
                policy_target = %self.target,
                from = %previous,
                open_for_ms = self.settings.timeout.as_millis() as u64,
                "Circuit breaker opened"
            );
        } else {
            info!(
                breaker = %self.settings.name,
                policy_target = %self.target,
                from = %previous,
                to = %state,
                "Circuit breaker state changed"
            );
        }
        self.metrics.record_breaker_transition(&self.target, state.as_str());
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            BreakerState::Closed if self.settings.interval.is_zero() => None,
            BreakerState::Closed => Some(now + self.settings.interval),
            BreakerState::Open => Some(now + self.settings.timeout),
            BreakerState::HalfOpen => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(trip: &str, max_requests: u32, timeout: Duration) -> CircuitBreaker {
        let mut settings = BreakerSettings::new("simpleCB", TripExpression::parse(trip).unwrap());
        settings.max_requests = max_requests;
        settings.timeout = timeout;
        CircuitBreaker::new(settings, "store")
    }

    fn fail(cb: &CircuitBreaker) {
        let generation = cb.before_request().unwrap();
        cb.after_request(generation, false);
    }

    fn succeed(cb: &CircuitBreaker) {
        let generation = cb.before_request().unwrap();
        cb.after_request(generation, true);
    }

    #[test]
    fn test_trip_expression_parsing() {
        let trip = TripExpression::parse("consecutiveFailures > 4").unwrap();
        let mut counts = Counts { consecutive_failures: 4, ..Default::default() };
        assert!(!trip.eval(&counts));
        counts.consecutive_failures = 5;
        assert!(trip.eval(&counts));
        assert_eq!(trip.as_str(), "consecutiveFailures > 4");
    }

    #[test]
    fn test_trip_expression_boolean_operators() {
        let trip =
            TripExpression::parse("requests >= 10 && totalFailures > 5 || consecutiveFailures == 3")
                .unwrap();
        assert!(trip.eval(&Counts { requests: 10, total_failures: 6, ..Default::default() }));
        assert!(!trip.eval(&Counts { requests: 9, total_failures: 6, ..Default::default() }));
        assert!(trip.eval(&Counts { consecutive_failures: 3, ..Default::default() }));
    }

    #[test]
    fn test_trip_expression_errors() {
        for expr in ["", "failures > 3", "consecutiveFailures >", "consecutiveFailures ~ 3"] {
            assert!(
                matches!(
                    TripExpression::parse(expr),
                    Err(PolicyConfigError::InvalidTripExpression { .. })
                ),
                "expected {expr:?} to be rejected"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_trip_and_rejects() {
        let cb = breaker("consecutiveFailures > 4", 1, Duration::from_secs(1));
        for _ in 0..4 {
            fail(&cb);
        }
        assert_eq!(cb.state(), BreakerState::Closed);
        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Open);
        assert_eq!(cb.before_request(), Err(Rejection::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker("consecutiveFailures > 2", 1, Duration::from_secs(1));
        fail(&cb);
        fail(&cb);
        succeed(&cb);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.counts().total_failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_closes_on_success() {
        let cb = breaker("consecutiveFailures > 0", 2, Duration::from_secs(1));
        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        let first = cb.before_request().unwrap();
        let second = cb.before_request().unwrap();
        assert_eq!(cb.before_request(), Err(Rejection::TooManyRequests));

        cb.after_request(first, true);
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.after_request(second, true);
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker("consecutiveFailures > 0", 1, Duration::from_secs(1));
        fail(&cb);
        tokio::time::advance(Duration::from_secs(1)).await;

        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Open);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cb.state(), BreakerState::Open);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cb.state(), BreakerState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let cb = breaker("consecutiveFailures > 0", 1, Duration::from_secs(1));
        let straggler = cb.before_request().unwrap();
        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        cb.after_request(straggler, true);
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_clears_closed_counts() {
        let mut settings =
            BreakerSettings::new("cb", TripExpression::parse("totalFailures > 2").unwrap());
        settings.interval = Duration::from_secs(10);
        let cb = CircuitBreaker::new(settings, "store");

        fail(&cb);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(10)).await;
        fail(&cb);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.counts().total_failures, 1);
    }
}
