//! Market data layer.
//!
//! Row and quote types returned by the market-data provider, the provider
//! abstraction, the TradingView scanner client and the in-memory price cache.

pub mod cache;
pub mod provider;
pub mod query;
pub mod tradingview;

pub use cache::{CacheStats, CachedPrice, PriceCache};
pub use provider::{MarketDataProvider, ProviderError};
pub use query::{Operand, Operator, OrderBy, Predicate, ScanQuery};
pub use tradingview::TradingViewClient;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exchanges treated as United States venues by the exchange filter.
pub const US_EXCHANGES: &[&str] = &[
    "NYSE",
    "NASDAQ",
    "NYSE AMERICAN",
    "NYSE ARCA",
    "CBOE",
    "CBOE BZX",
    "CBOE BYX",
    "CBOE EDGX",
    "CBOE EDGA",
    "IEX",
    "OTC",
    "OTC MARKETS",
    "PHILADELPHIA STOCK EXCHANGE",
    "NYSE CHICAGO",
    "NATIONAL STOCK EXCHANGE",
    "NASDAQ BX",
    "BATS",
    "INSTINET",
];

// ============================================================================
// Candlestick Patterns
// ============================================================================

/// Daily candlestick pattern flags exposed by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CandlePattern {
    Hammer,
    EngulfingBullish,
    Doji,
    MarubozuWhite,
}

impl CandlePattern {
    /// All pattern columns, in the order they are requested and labelled.
    pub const ALL: [CandlePattern; 4] = [
        Self::Hammer,
        Self::EngulfingBullish,
        Self::Doji,
        Self::MarubozuWhite,
    ];

    /// Scanner column name.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Hammer => "Candle.Hammer",
            Self::EngulfingBullish => "Candle.Engulfing.Bullish",
            Self::Doji => "Candle.Doji",
            Self::MarubozuWhite => "Candle.Marubozu.White",
        }
    }

    /// Whether the pattern counts towards the bullish-only filter.
    ///
    /// Doji is an indecision pattern: it is labelled but never qualifies a row.
    pub const fn is_bullish(self) -> bool {
        !matches!(self, Self::Doji)
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.column() == column)
    }
}

impl fmt::Display for CandlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ============================================================================
// Fields
// ============================================================================

/// A scanner column the screener reads or filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Exchange,
    Close,
    Change,
    Volume,
    Sma20,
    RelativeVolume,
    MarketCap,
    Atr,
    Adr,
    Candle(CandlePattern),
}

impl Field {
    /// Columns fetched by every screening query, in request order.
    pub const SCAN_COLUMNS: [Field; 14] = [
        Self::Name,
        Self::Atr,
        Self::Adr,
        Self::Close,
        Self::Volume,
        Self::Exchange,
        Self::Sma20,
        Self::RelativeVolume,
        Self::Change,
        Self::MarketCap,
        Self::Candle(CandlePattern::Hammer),
        Self::Candle(CandlePattern::EngulfingBullish),
        Self::Candle(CandlePattern::Doji),
        Self::Candle(CandlePattern::MarubozuWhite),
    ];

    /// Scanner column name.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Exchange => "exchange",
            Self::Close => "close",
            Self::Change => "change",
            Self::Volume => "volume",
            Self::Sma20 => "SMA20",
            Self::RelativeVolume => "relative_volume",
            Self::MarketCap => "market_cap_basic",
            Self::Atr => "ATR",
            Self::Adr => "ADR",
            Self::Candle(pattern) => pattern.column(),
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        let field = match column {
            "name" => Self::Name,
            "exchange" => Self::Exchange,
            "close" => Self::Close,
            "change" => Self::Change,
            "volume" => Self::Volume,
            "SMA20" => Self::Sma20,
            "relative_volume" => Self::RelativeVolume,
            "market_cap_basic" => Self::MarketCap,
            "ATR" => Self::Atr,
            "ADR" => Self::Adr,
            other => return CandlePattern::from_column(other).map(Self::Candle),
        };
        Some(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ============================================================================
// Rows & Quotes
// ============================================================================

/// One row of a bulk scan. Any column may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    /// Exchange-qualified ticker, e.g. `NASDAQ:AAPL`
    pub ticker: String,
    /// Bare symbol (the `name` column)
    pub symbol: String,
    pub exchange: Option<String>,
    pub close: Option<f64>,
    pub change: Option<f64>,
    pub volume: Option<f64>,
    pub sma20: Option<f64>,
    pub relative_volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub atr: Option<f64>,
    pub adr: Option<f64>,
    /// Pattern flags; a missing entry reads as false
    #[serde(default)]
    pub patterns: BTreeMap<CandlePattern, bool>,
}

impl ScanRow {
    /// Create an empty row for `exchange:symbol`.
    pub fn new(exchange: &str, symbol: &str) -> Self {
        Self {
            ticker: format!("{exchange}:{symbol}"),
            symbol: symbol.to_string(),
            exchange: Some(exchange.to_string()),
            ..Default::default()
        }
    }

    /// Numeric value of a column, if present.
    pub fn number(&self, field: Field) -> Option<f64> {
        match field {
            Field::Close => self.close,
            Field::Change => self.change,
            Field::Volume => self.volume,
            Field::Sma20 => self.sma20,
            Field::RelativeVolume => self.relative_volume,
            Field::MarketCap => self.market_cap,
            Field::Atr => self.atr,
            Field::Adr => self.adr,
            Field::Candle(pattern) => self.patterns.get(&pattern).map(|&b| f64::from(u8::from(b))),
            Field::Name | Field::Exchange => None,
        }
    }

    /// Text value of a column, if present.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => Some(self.symbol.as_str()),
            Field::Exchange => self.exchange.as_deref(),
            _ => None,
        }
    }

    pub fn set_number(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::Close => self.close = value,
            Field::Change => self.change = value,
            Field::Volume => self.volume = value,
            Field::Sma20 => self.sma20 = value,
            Field::RelativeVolume => self.relative_volume = value,
            Field::MarketCap => self.market_cap = value,
            Field::Atr => self.atr = value,
            Field::Adr => self.adr = value,
            Field::Candle(pattern) => {
                if let Some(v) = value {
                    self.patterns.insert(pattern, v != 0.0);
                }
            }
            Field::Name | Field::Exchange => {}
        }
    }

    /// Builder-style numeric setter.
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set_number(field, Some(value));
        self
    }

    /// Builder-style pattern setter.
    pub fn with_pattern(mut self, pattern: CandlePattern, present: bool) -> Self {
        self.patterns.insert(pattern, present);
        self
    }

    pub fn pattern(&self, pattern: CandlePattern) -> bool {
        self.patterns.get(&pattern).copied().unwrap_or(false)
    }
}

/// Live quote for a single symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub price: f64,
    /// Absolute change
    pub change: f64,
    /// Change in percent
    pub change_percent: f64,
}
