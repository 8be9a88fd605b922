//! Execution of one logical call under a composed policy.
//!
//! Outside-in: the retry schedule decides how many attempts run and how long to
//! wait between them; the circuit breaker decides whether each attempt may start
//! and records its outcome; the timeout bounds each attempt on its own. The
//! caller's cancellation and deadline bound everything, including backoff waits.

use super::breaker::{CircuitBreaker, Rejection};
use super::error::PolicyError;
use super::retry::RetryPolicy;
use crate::context::RequestContext;
use crate::observability::MetricsRecorder;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The policies bound to one target.
#[derive(Default)]
pub struct PolicyDefinition {
    target: String,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    breaker: Option<Arc<CircuitBreaker>>,
    metrics: MetricsRecorder,
}

impl fmt::Debug for PolicyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDefinition")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.breaker.as_ref().map(|cb| cb.name().to_string()))
            .finish()
    }
}

impl PolicyDefinition {
    /// An unprotected definition: one attempt, no timeout, no breaker.
    pub fn unprotected(target: impl Into<String>) -> Self {
        Self { target: target.into(), ..Default::default() }
    }

    pub fn new(
        target: impl Into<String>,
        timeout: Option<Duration>,
        retry: Option<RetryPolicy>,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Self {
        Self { target: target.into(), timeout, retry, breaker, metrics: MetricsRecorder::new() }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn is_unprotected(&self) -> bool {
        self.timeout.is_none() && self.retry.is_none() && self.breaker.is_none()
    }

    /// Run `operation` under this definition.
    ///
    /// `operation` performs exactly one attempt each time it is called. On failure
    /// the most recent underlying error is returned; a breaker rejection ends the
    /// call immediately and reports the last operation error seen in this call, if
    /// there was one.
    pub async fn run<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        mut operation: F,
    ) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = match &self.retry {
            Some(retry) => retry.max_attempts(),
            None => Some(1),
        };
        let mut backoff = self.retry.as_ref().map(RetryPolicy::backoff);
        let mut last_error: Option<PolicyError<E>> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let generation = match &self.breaker {
                Some(cb) => match cb.before_request() {
                    Ok(generation) => Some((cb, generation)),
                    Err(rejection) => {
                        let rejected = match rejection {
                            Rejection::Open => {
                                PolicyError::CircuitOpen { name: cb.name().to_string() }
                            }
                            Rejection::TooManyRequests => {
                                PolicyError::TooManyRequests { name: cb.name().to_string() }
                            }
                        };
                        debug!(
                            policy_target = %self.target,
                            attempt,
                            error = %rejected,
                            "Attempt rejected"
                        );
                        self.metrics.record_attempt(&self.target, "rejected");
                        return Err(last_error.unwrap_or(rejected));
                    }
                },
                None => None,
            };

            let result = self.attempt(ctx, &mut operation).await;

            if let Some((cb, generation)) = generation {
                cb.after_request(generation, result.is_ok());
            }

            let error = match result {
                Ok(value) => {
                    self.metrics.record_attempt(&self.target, "success");
                    if attempt > 1 {
                        debug!(policy_target = %self.target, attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_caller_abort() => {
                    self.metrics.record_attempt(&self.target, "aborted");
                    return Err(error);
                }
                Err(error) => error,
            };
            self.metrics.record_attempt(&self.target, "failure");

            if max_attempts.is_some_and(|max| attempt >= max) {
                if self.retry.is_some() {
                    warn!(policy_target = %self.target, attempt, error = %error, "Retries exhausted");
                }
                return Err(error);
            }

            let delay = backoff.as_mut().and_then(Iterator::next).unwrap_or_default();
            debug!(
                policy_target = %self.target,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, will retry"
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(PolicyError::Cancelled),
                _ = ctx.deadline_elapsed() => return Err(PolicyError::DeadlineExceeded),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt<T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &mut F,
    ) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let call = operation();
        let bounded = async {
            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result.map_err(PolicyError::Operation),
                    Err(_) => Err(PolicyError::Timeout(timeout)),
                },
                None => call.await.map_err(PolicyError::Operation),
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(PolicyError::Cancelled),
            _ = ctx.deadline_elapsed() => Err(PolicyError::DeadlineExceeded),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resiliency::breaker::{BreakerSettings, BreakerState, TripExpression};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom #{}", self.0)
        }
    }

    fn constant(retries: u32) -> Option<RetryPolicy> {
        Some(RetryPolicy::constant(Duration::from_millis(10), Some(retries)))
    }

    #[tokio::test]
    async fn test_unprotected_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = PolicyDefinition::unprotected("store");
        let result: Result<(), _> = policy
            .run(&RequestContext::background(), || async {
                Err(Boom(calls.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .await;

        assert!(matches!(result, Err(PolicyError::Operation(Boom(1)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let policy = PolicyDefinition::new("store", None, constant(3), None);
        let result = policy
            .run(&RequestContext::background(), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Boom(n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = PolicyDefinition::new("store", None, constant(2), None);
        let result: Result<(), _> = policy
            .run(&RequestContext::background(), || async {
                Err(Boom(calls.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .await;

        assert!(matches!(result, Err(PolicyError::Operation(Boom(3)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let calls = AtomicU32::new(0);
        let policy =
            PolicyDefinition::new("store", Some(Duration::from_millis(100)), constant(1), None);
        let start = tokio::time::Instant::now();
        let result: Result<(), PolicyError<Boom>> = policy
            .run(&RequestContext::background(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PolicyError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_stops_retries() {
        let trip = TripExpression::parse("consecutiveFailures > 1").unwrap();
        let breaker = Arc::new(CircuitBreaker::new(BreakerSettings::new("cb", trip), "store"));
        let policy = PolicyDefinition::new("store", None, constant(10), Some(Arc::clone(&breaker)));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(&RequestContext::background(), || async {
                Err(Boom(calls.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .await;

        assert!(matches!(result, Err(PolicyError::Operation(Boom(2)))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), BreakerState::Open);

        let rejected: Result<(), PolicyError<Boom>> =
            policy.run(&RequestContext::background(), || async { Ok(()) }).await;
        assert!(matches!(rejected, Err(PolicyError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_backoff_wait() {
        let policy = PolicyDefinition::new(
            "store",
            None,
            Some(RetryPolicy::constant(Duration::from_secs(30), None)),
            None,
        );
        let ctx = RequestContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let result: Result<(), _> = policy.run(&ctx, || async { Err(Boom(0)) }).await;

        assert!(matches!(result, Err(PolicyError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_in_flight_attempt() {
        let policy = PolicyDefinition::unprotected("store");
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(200));
        let result: Result<(), PolicyError<Boom>> = policy
            .run(&ctx, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PolicyError::DeadlineExceeded)));
    }
}
