//! Result projection.
//!
//! Reduces enriched rows to the fixed output column set. Intermediate values
//! (ADR%, exchange, raw pattern flags) are dropped; provider order is kept.

use serde::{Deserialize, Serialize};

use super::derived::EnrichedRow;
use super::Outcome;

/// Output columns, in order.
pub const COLUMNS: [&str; 9] = [
    "symbol",
    "close",
    "change",
    "volume",
    "moving_average",
    "relative_volume",
    "market_cap",
    "atr_pct",
    "pattern_label",
];

/// One row of a screening result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub symbol: String,
    pub close: Option<f64>,
    pub change: Option<f64>,
    pub volume: Option<f64>,
    /// SMA20
    pub moving_average: Option<f64>,
    pub relative_volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub atr_pct: Option<f64>,
    pub pattern_label: String,
}

impl From<EnrichedRow> for ResultRow {
    fn from(enriched: EnrichedRow) -> Self {
        let row = enriched.row;
        Self {
            symbol: row.symbol,
            close: row.close,
            change: row.change,
            volume: row.volume,
            moving_average: row.sma20,
            relative_volume: row.relative_volume,
            market_cap: row.market_cap,
            atr_pct: enriched.atr_pct,
            pattern_label: enriched.pattern_label,
        }
    }
}

/// A non-empty screening result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.symbol.as_str()).collect()
    }
}

/// Project enriched rows onto the output columns.
pub fn project(rows: Outcome<EnrichedRow>) -> Option<ResultTable> {
    match rows {
        Outcome::Rows(rows) => Some(ResultTable {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(ResultRow::from).collect(),
        }),
        Outcome::Empty => None,
    }
}
