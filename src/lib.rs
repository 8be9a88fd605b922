//! # Sidecar Secrets
//!
//! The secret retrieval path of a sidecar application runtime. Given a store name
//! and a key it finds the configured backend, checks the store's access scope,
//! serves from the per-store cache when allowed, and otherwise calls the backend
//! under the store's resiliency policy.
//!
//! ## Architecture
//!
//! ```text
//! SecretsApi → ScopeEvaluator → SecretCache → Resiliency → SecretStore
//!     ↑                                                        ↑
//! startup::build_secrets_api ← RuntimeConfig      Registry (factories by type/version)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sidecar_secrets::components::{SecretStoreRegistry, SECRET_STORE_KIND};
//! use sidecar_secrets::config::RuntimeConfig;
//! use sidecar_secrets::context::RequestContext;
//! use sidecar_secrets::secrets::{backends::register_builtin, GetSecretRequest};
//! use sidecar_secrets::startup::build_secrets_api;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RuntimeConfig::load("sidecar.yaml")?;
//!     let registry = SecretStoreRegistry::new(SECRET_STORE_KIND);
//!     register_builtin(&registry);
//!
//!     let api = build_secrets_api(&config, &registry).await?;
//!     let secret = api
//!         .get_secret(&RequestContext::background(), GetSecretRequest::new("local", "db"))
//!         .await?;
//!     println!("{:?}", secret.data.keys());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod components;
pub mod config;
pub mod context;
pub mod errors;
pub mod observability;
pub mod resiliency;
pub mod secrets;
pub mod startup;

pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
