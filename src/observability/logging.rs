//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.

use crate::config::ObservabilityConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for one secret request.
///
/// ```rust,ignore
/// let span = secret_span!("get_secret", "vault");
/// let span = secret_span!("get_secret", "vault", key = "db-password");
/// ```
#[macro_export]
macro_rules! secret_span {
    ($operation:expr, $store:expr) => {
        tracing::info_span!(
            "secret_request",
            operation = %$operation,
            store = %$store,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $store:expr, $($field:tt)*) => {
        tracing::info_span!(
            "secret_request",
            operation = %$operation,
            store = %$store,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = if config.json_logging {
        tracing::subscriber::set_global_default(
            fmt().json().with_current_span(true).with_env_filter(filter).finish(),
        )
    } else {
        tracing::subscriber::set_global_default(fmt().with_env_filter(filter).finish())
    };
}

/// Log the loaded runtime configuration at startup.
pub fn log_config_info(config: &crate::config::RuntimeConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        app_id = %config.app_id,
        namespace = config.namespace.as_deref().unwrap_or(""),
        components = config.components.len(),
        secret_scopes = config.secrets.scopes.len(),
        resiliency_targets = config.resiliency.targets.components.len(),
        "Sidecar secrets runtime configuration"
    );
}
