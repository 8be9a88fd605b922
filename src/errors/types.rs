//! # Error Types
//!
//! Crate-level error types for configuration, startup wiring and I/O using `thiserror`.
//! Request-path failures use [`crate::secrets::SecretsError`] instead.

use crate::components::metadata::MetadataError;
use crate::components::registry::RegistryError;
use crate::resiliency::PolicyConfigError;

/// Custom result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bootstrapping and configuring the secrets runtime
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// A component could not be resolved or initialised
    #[error("Component '{name}' failed: {message}")]
    Component { name: String, message: String },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

}

impl Error {
    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a component error
    pub fn component<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Component { name: name.into(), message: message.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Self::config_with_source("Configuration document is not valid YAML", Box::new(error))
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

impl From<RegistryError> for Error {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound { ref full_name, .. } => {
                Self::component(full_name.clone(), error.to_string())
            }
        }
    }
}

impl From<MetadataError> for Error {
    fn from(error: MetadataError) -> Self {
        Self::config_with_source("Component metadata could not be resolved", Box::new(error))
    }
}

impl From<PolicyConfigError> for Error {
    fn from(error: PolicyConfigError) -> Self {
        Self::config_with_source("Invalid resiliency configuration", Box::new(error))
    }
}
