//! Error types for screening and price refresh.

use screener_common::ErrorReport;
use thiserror::Error;

use crate::data::ProviderError;
use crate::params::InvalidParameter;

/// Errors raised by the screener engine, the store and the price updater.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),

    #[error("Provider failure: {0}")]
    ProviderFailure(#[from] ProviderError),

    #[error("Price refresh failed: {0}")]
    RefreshLoop(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ScreenerError {
    /// Machine-readable kind for error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::ProviderFailure(_) => "provider_failure",
            Self::RefreshLoop(_) => "refresh_loop",
            Self::Storage(_) => "storage",
        }
    }

    /// Provider failures carry the provider's own failure class as detail.
    pub fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.kind(), self.to_string());
        match self {
            Self::ProviderFailure(e) => report.with_detail(e.kind()),
            _ => report,
        }
    }
}

impl From<rusqlite::Error> for ScreenerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ScreenerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("Invalid stored JSON: {}", err))
    }
}

/// Result type for screener operations.
pub type Result<T> = std::result::Result<T, ScreenerError>;
