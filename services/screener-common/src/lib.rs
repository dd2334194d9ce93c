//! Screener Common - shared configuration, errors and logging for the screener service.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and the structured error report used at service boundaries
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    Config, NetworkConfig, ObservabilityConfig, ProviderConfig, StorageConfig, UpdaterConfig,
};
pub use error::{Error, ErrorReport};
pub use validation::{Validate, ValidationError, ValidationResult};
