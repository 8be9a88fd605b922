//! # Command Line Interface
//!
//! Local tooling for reading secrets through the configured stores, scopes,
//! cache and resiliency policies, and for checking a runtime configuration.

pub mod output;

use crate::components::secretstores::{Metadata, SecretStoreRegistry, SECRET_STORE_KIND};
use crate::config::RuntimeConfig;
use crate::context::RequestContext;
use crate::observability::{init_logging, log_config_info};
use crate::resiliency::Resiliency;
use crate::secrets::backends::register_builtin;
use crate::secrets::{GetBulkSecretRequest, GetSecretRequest};
use crate::startup::build_secrets_api;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sidecar-secrets")]
#[command(about = "Sidecar secret retrieval tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the runtime configuration file
    #[arg(short, long, global = true, default_value = "sidecar.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Deadline for the whole request, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read one secret
    Get {
        /// Secret store name
        #[arg(long)]
        store: String,

        /// Secret key
        #[arg(long)]
        key: String,

        /// Bypass the cache and overwrite the cached value
        #[arg(long)]
        refresh: bool,

        /// Metadata passed to the store, as key=value
        #[arg(long = "metadata", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },

    /// Read every secret a store exposes
    Bulk {
        /// Secret store name
        #[arg(long)]
        store: String,

        /// Metadata passed to the store, as key=value
        #[arg(long = "metadata", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },

    /// Validate the configuration and print a summary
    Validate,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = RuntimeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    init_logging(&config.observability);
    log_config_info(&config);

    let registry = SecretStoreRegistry::new(SECRET_STORE_KIND);
    register_builtin(&registry);

    let shutdown = CancellationToken::new();
    let on_interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let ctx = RequestContext::with_cancellation(shutdown);
    let ctx = match cli.timeout_ms {
        Some(ms) => ctx.with_timeout(Duration::from_millis(ms)),
        None => ctx,
    };

    match cli.command {
        Commands::Get { store, key, refresh, metadata } => {
            let api = build_secrets_api(&config, &registry).await?;
            let mut req = GetSecretRequest::new(store, key);
            req.metadata = collect_metadata(metadata);
            if refresh {
                req = req.with_refresh();
            }
            let result = api.get_secret(&ctx, req).await;
            api.close().await;
            output::print_json(&result?.data)?;
        }
        Commands::Bulk { store, metadata } => {
            let api = build_secrets_api(&config, &registry).await?;
            let mut req = GetBulkSecretRequest::new(store);
            req.metadata = collect_metadata(metadata);
            let result = api.get_bulk_secret(&ctx, req).await;
            api.close().await;
            output::print_json(&result?.data)?;
        }
        Commands::Validate => validate(&config, &registry)?,
    }

    Ok(())
}

fn validate(config: &RuntimeConfig, registry: &SecretStoreRegistry) -> anyhow::Result<()> {
    let resiliency = Resiliency::from_config(&config.resiliency)?;

    let mut stores = Vec::new();
    for component in config.secret_stores() {
        if registry.resolve(&component.component_type, &component.version).is_none() {
            anyhow::bail!(
                "Component '{}': couldn't find secret store {}/{}",
                component.name,
                component.component_type,
                component.version
            );
        }
        stores.push(serde_json::json!({
            "name": component.name,
            "type": component.component_type,
            "version": component.version,
            "resiliency": resiliency.has_policy(&component.name),
        }));
    }

    let scopes: Vec<_> = config.secrets.scopes.iter().map(|s| s.store_name.as_str()).collect();
    output::print_json(&serde_json::json!({
        "appId": config.app_id,
        "secretStores": stores,
        "scopedStores": scopes,
        "resiliencyTargets": resiliency.targets(),
    }))
}

fn collect_metadata(pairs: Vec<(String, String)>) -> Metadata {
    pairs.into_iter().collect()
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) =
        s.split_once('=').ok_or_else(|| format!("invalid key=value pair: no '=' in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid key=value pair: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
