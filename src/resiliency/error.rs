//! Error types for resiliency policies.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while building policies from configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyConfigError {
    #[error("invalid duration '{value}'")]
    InvalidDuration { value: String },

    #[error("invalid trip expression '{expression}': {reason}")]
    InvalidTripExpression { expression: String, reason: String },

    #[error("invalid retry policy '{name}': {reason}")]
    InvalidRetry { name: String, reason: String },

    #[error("invalid circuit breaker '{name}': {reason}")]
    InvalidCircuitBreaker { name: String, reason: String },

    /// A target binding refers to a policy that is not defined.
    #[error("target '{target}' references unknown {kind} policy '{policy}'")]
    UnknownPolicy { target: String, kind: &'static str, policy: String },
}

/// Outcome of running an operation under a policy when it did not succeed.
#[derive(Debug, Error)]
pub enum PolicyError<E> {
    /// The operation itself failed; this is the most recent underlying error.
    #[error(transparent)]
    Operation(E),

    /// A single attempt exceeded the per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The circuit breaker is open and rejected the attempt.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// The circuit breaker is half-open and its trial budget is spent.
    #[error("circuit breaker '{name}' is half-open and rejected the request")]
    TooManyRequests { name: String },

    /// The caller cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl<E> PolicyError<E> {
    /// True for failures caused by the caller rather than the operation.
    pub fn is_caller_abort(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True when a circuit breaker refused to run the operation.
    pub fn is_breaker_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::TooManyRequests { .. })
    }

    /// The operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}
