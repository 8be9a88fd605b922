//! Error types for secret retrieval requests.
//!
//! Every failure surfaced by [`crate::secrets::SecretsApi`] falls into exactly one
//! [`ErrorCategory`], which maps onto the transport's status codes.

use crate::components::secretstores::StoreError;
use crate::resiliency::PolicyError;
use thiserror::Error;

/// Result type for secret requests.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Boundary error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotConfigured,
    InvalidArgument,
    PermissionDenied,
    Internal,
}

/// Errors returned by secret requests.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// No secret store exists in this process.
    #[error("secret store is not configured")]
    NotConfigured,

    /// The named store is not configured.
    #[error("failed finding secret store with key {store}")]
    StoreNotFound { store: String },

    /// The store's access scope does not permit reading the key.
    #[error("access denied by policy to get \"{key}\" from \"{store}\"")]
    PermissionDenied { store: String, key: String },

    /// The backend call failed once its resiliency policy was exhausted.
    #[error("failed getting secret with key {key} from secret store {store}: {source}")]
    GetSecret {
        store: String,
        key: String,
        #[source]
        source: PolicyError<StoreError>,
    },

    /// The bulk backend call failed once its resiliency policy was exhausted.
    #[error("failed getting secrets from secret store {store}: {source}")]
    BulkGetSecret {
        store: String,
        #[source]
        source: PolicyError<StoreError>,
    },
}

impl SecretsError {
    pub fn store_not_found(store: impl Into<String>) -> Self {
        Self::StoreNotFound { store: store.into() }
    }

    pub fn permission_denied(key: impl Into<String>, store: impl Into<String>) -> Self {
        Self::PermissionDenied { store: store.into(), key: key.into() }
    }

    pub fn get_secret(
        key: impl Into<String>,
        store: impl Into<String>,
        source: PolicyError<StoreError>,
    ) -> Self {
        Self::GetSecret { store: store.into(), key: key.into(), source }
    }

    pub fn bulk_get_secret(store: impl Into<String>, source: PolicyError<StoreError>) -> Self {
        Self::BulkGetSecret { store: store.into(), source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConfigured => ErrorCategory::NotConfigured,
            Self::StoreNotFound { .. } => ErrorCategory::InvalidArgument,
            Self::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            Self::GetSecret { .. } | Self::BulkGetSecret { .. } => ErrorCategory::Internal,
        }
    }

    /// Transport status code for this error.
    pub fn code(&self) -> tonic::Code {
        match self.category() {
            ErrorCategory::NotConfigured => tonic::Code::FailedPrecondition,
            ErrorCategory::InvalidArgument => tonic::Code::InvalidArgument,
            ErrorCategory::PermissionDenied => tonic::Code::PermissionDenied,
            ErrorCategory::Internal => tonic::Code::Internal,
        }
    }

    /// The resiliency outcome behind an internal error.
    pub fn policy_error(&self) -> Option<&PolicyError<StoreError>> {
        match self {
            Self::GetSecret { source, .. } | Self::BulkGetSecret { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotConfigured => "not_configured",
            ErrorCategory::InvalidArgument => "invalid_argument",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<SecretsError> for tonic::Status {
    fn from(error: SecretsError) -> Self {
        tonic::Status::new(error.code(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(SecretsError::NotConfigured.to_string(), "secret store is not configured");
        assert_eq!(
            SecretsError::store_not_found("store9").to_string(),
            "failed finding secret store with key store9"
        );
        assert_eq!(
            SecretsError::permission_denied("random", "store3").to_string(),
            "access denied by policy to get \"random\" from \"store3\""
        );

        let err = SecretsError::get_secret(
            "error-key",
            "store1",
            PolicyError::Operation(StoreError::backend("error occurs with error-key")),
        );
        assert_eq!(
            err.to_string(),
            "failed getting secret with key error-key from secret store store1: \
             backend error: error occurs with error-key"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SecretsError::NotConfigured, tonic::Code::FailedPrecondition),
            (SecretsError::store_not_found("s"), tonic::Code::InvalidArgument),
            (SecretsError::permission_denied("k", "s"), tonic::Code::PermissionDenied),
            (SecretsError::bulk_get_secret("s", PolicyError::Cancelled), tonic::Code::Internal),
        ];

        for (error, code) in cases {
            let message = error.to_string();
            let status: tonic::Status = error.into();
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), message);
        }
    }

    #[test]
    fn test_policy_error_exposed() {
        let err = SecretsError::get_secret("k", "s", PolicyError::Timeout(Default::default()));
        assert!(matches!(err.policy_error(), Some(PolicyError::Timeout(_))));
        assert_eq!(err.outcome(), "internal");
        assert!(SecretsError::NotConfigured.policy_error().is_none());
    }
}
