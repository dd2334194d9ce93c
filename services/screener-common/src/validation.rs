//! Configuration validation for the screener service.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{
    Config, NetworkConfig, ObservabilityConfig, ProviderConfig, UpdaterConfig,
    MAX_CACHE_TTL_HOURS, MIN_UPDATE_INTERVAL_SECS,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.network.validate(),
            self.observability.validate(),
            self.provider.validate(),
            self.updater.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

impl Validate for NetworkConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "network.port".into(),
            });
        }
        if self.bind.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidValue {
                field: "provider.base_url".into(),
                reason: "must start with http:// or https://".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "provider.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.scan_limit == 0 {
            return Err(ValidationError::InvalidValue {
                field: "provider.scan_limit".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for UpdaterConfig {
    fn validate(&self) -> ValidationResult<()> {
        // Intervals below the minimum are clamped at runtime, not rejected.
        if self.cache_ttl_hours == 0 {
            return Err(ValidationError::InvalidValue {
                field: "updater.cache_ttl_hours".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(ValidationError::InvalidValue {
                field: "updater.cache_ttl_hours".into(),
                reason: format!("must be at most {MAX_CACHE_TTL_HOURS}"),
            });
        }
        if self.eviction_every == 0 {
            return Err(ValidationError::InvalidValue {
                field: "updater.eviction_every".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.error_backoff_secs < MIN_UPDATE_INTERVAL_SECS {
            return Err(ValidationError::InvalidValue {
                field: "updater.error_backoff_secs".into(),
                reason: format!("must be at least {MIN_UPDATE_INTERVAL_SECS}"),
            });
        }
        Ok(())
    }
}
