//! Derived metrics and local filtering.
//!
//! Runs on the fetched rows, in order:
//! 1. ATR% = ATR / close * 100, bounded by `min_atr_pct` / `max_atr_pct`
//! 2. ADR% = ADR / close * 100, bounded by `min_adr_pct`
//! 3. Pattern label and the bullish-only filter
//!
//! A stage that leaves no rows ends the pipeline with `Outcome::Empty`.

use serde::{Deserialize, Serialize};

use crate::data::{CandlePattern, ScanRow};

use super::compiler::LocalFilters;
use super::Outcome;

// ============================================================================
// Filter Stage
// ============================================================================

/// Stage identifier for tracking where rows are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Rows returned by the provider
    Fetch,
    Atr,
    Adr,
    Pattern,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "provider scan"),
            Self::Atr => write!(f, "ATR% bounds"),
            Self::Adr => write!(f, "ADR% floor"),
            Self::Pattern => write!(f, "bullish patterns"),
        }
    }
}

/// Row counts for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub stage: FilterStage,
    pub passed: usize,
    pub eliminated: usize,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        Self {
            stage,
            passed: passed_count,
            eliminated: input_count.saturating_sub(passed_count),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// A fetched row with its derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub row: ScanRow,
    pub atr_pct: Option<f64>,
    pub adr_pct: Option<f64>,
    pub pattern_label: String,
}

/// `value / close * 100`, or `None` when either side is missing or close is zero.
pub fn percent_of_close(value: Option<f64>, close: Option<f64>) -> Option<f64> {
    match (value, close) {
        (Some(v), Some(c)) if c != 0.0 => Some(v / c * 100.0),
        _ => None,
    }
}

/// Comma-joined column names of the patterns present on the row.
pub fn pattern_label(row: &ScanRow) -> String {
    CandlePattern::ALL
        .into_iter()
        .filter(|p| row.pattern(*p))
        .map(CandlePattern::column)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn has_bullish_pattern(row: &ScanRow) -> bool {
    CandlePattern::ALL
        .into_iter()
        .any(|p| p.is_bullish() && row.pattern(p))
}

/// An unset bound always passes; a set bound fails a missing metric.
fn within(metric: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = metric else {
        return false;
    };
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn stage<T>(
    rows: Vec<T>,
    which: FilterStage,
    results: &mut Vec<FilterResult>,
    keep: impl Fn(&T) -> bool,
) -> Outcome<T> {
    let input = rows.len();
    let passed: Vec<T> = rows.into_iter().filter(|r| keep(r)).collect();
    results.push(FilterResult::new(which, input, passed.len()));
    Outcome::from_rows(passed)
}

/// Compute metrics and apply the local filters.
pub fn apply(
    rows: Outcome<ScanRow>,
    filters: &LocalFilters,
) -> (Outcome<EnrichedRow>, Vec<FilterResult>) {
    let mut results = Vec::with_capacity(3);

    let enriched = rows.map_rows(|row| EnrichedRow {
        atr_pct: percent_of_close(row.atr, row.close),
        adr_pct: percent_of_close(row.adr, row.close),
        pattern_label: pattern_label(&row),
        row,
    });

    let Outcome::Rows(rows) = enriched else {
        return (Outcome::Empty, results);
    };
    let Outcome::Rows(rows) = stage(rows, FilterStage::Atr, &mut results, |r| {
        within(r.atr_pct, filters.min_atr_pct, filters.max_atr_pct)
    }) else {
        return (Outcome::Empty, results);
    };
    let Outcome::Rows(rows) = stage(rows, FilterStage::Adr, &mut results, |r| {
        within(r.adr_pct, filters.min_adr_pct, None)
    }) else {
        return (Outcome::Empty, results);
    };
    let outcome = stage(rows, FilterStage::Pattern, &mut results, |r| {
        !filters.bullish_only || has_bullish_pattern(&r.row)
    });

    (outcome, results)
}
