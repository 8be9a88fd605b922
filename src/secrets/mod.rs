//! # Secrets
//!
//! The secret retrieval path: access scopes, the per-store cache and the
//! [`SecretsApi`] orchestrator that serves single and bulk reads through each
//! store's resiliency policy.
//!
//! ```rust,ignore
//! use sidecar_secrets::context::RequestContext;
//! use sidecar_secrets::secrets::{GetSecretRequest, SecretsApi};
//!
//! let api = SecretsApi::builder().store("local", Box::new(store)).build()?;
//! let resp = api
//!     .get_secret(&RequestContext::background(), GetSecretRequest::new("local", "db-password"))
//!     .await?;
//! ```

pub mod api;
pub mod backends;
pub mod cache;
pub mod error;
pub mod scope;
pub mod types;

pub use api::{SecretsApi, SecretsApiBuilder};
pub use cache::{SecretCache, CACHE_ENABLE_KEY};
pub use error::{ErrorCategory, SecretsError};
pub use scope::{AccessPolicy, ScopeEvaluator, SecretsScope};
pub use types::{
    GetBulkSecretRequest, GetBulkSecretResponse, GetSecretRequest, GetSecretResponse,
    REFRESH_CACHE_KEY,
};
