//! # Observability
//!
//! Structured logging and metrics for the secret retrieval path.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::MetricsRecorder;
