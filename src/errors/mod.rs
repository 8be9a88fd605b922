//! # Error Handling
//!
//! Error types for loading configuration and wiring the secrets runtime.

pub mod types;

pub use types::{Error, Result};
