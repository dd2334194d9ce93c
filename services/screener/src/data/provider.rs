//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the screener engine and the price
//! updater are written against. The provider is treated as a black-box bulk
//! data source: one range request per scan.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use super::{LiveQuote, ScanQuery, ScanRow};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised by market data providers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection failed or the request could not be sent
    Network(String),
    /// Request exceeded the client timeout
    Timeout(String),
    /// Non-success HTTP status
    Http { status: u16, body: String },
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Response could not be decoded
    Malformed(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            Self::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::Malformed(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Machine-readable kind used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Http { .. } => "http_status",
            Self::RateLimited { .. } => "rate_limited",
            Self::Malformed(_) => "malformed_response",
        }
    }

    /// Transient failures worth retrying on the next refresh cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. }
        ) || matches!(self, Self::Http { status, .. } if *status >= 500)
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Source of bulk scans and live quotes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name (e.g., "tradingview")
    fn name(&self) -> &'static str;

    /// Run a bulk scan. Rows come back in the query's order.
    async fn scan(&self, query: &ScanQuery) -> Result<Vec<ScanRow>, ProviderError>;

    /// Fetch live quotes for bare symbols.
    ///
    /// Every requested symbol appears in the result (uppercased); symbols the
    /// provider does not know map to `None`.
    async fn live_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<LiveQuote>>, ProviderError>;
}
