//! Filter compiler.
//!
//! Turns a `ScreenParams` set into a provider `ScanQuery` (columns, pushdown
//! predicates, ordering, limit) plus the local filters that run after the
//! fetch. Unset parameters contribute no clause.

use serde::Serialize;

use crate::data::{Field, OrderBy, Predicate, ScanQuery, US_EXCHANGES};
use crate::params::ScreenParams;

/// Default row limit for a bulk scan.
pub const DEFAULT_SCAN_LIMIT: usize = 1_000_000;

/// Filters evaluated on fetched rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocalFilters {
    pub min_atr_pct: Option<f64>,
    pub max_atr_pct: Option<f64>,
    pub min_adr_pct: Option<f64>,
    pub bullish_only: bool,
}

impl LocalFilters {
    pub fn is_empty(&self) -> bool {
        self.min_atr_pct.is_none()
            && self.max_atr_pct.is_none()
            && self.min_adr_pct.is_none()
            && !self.bullish_only
    }
}

/// Output of the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub scan: ScanQuery,
    pub local: LocalFilters,
}

/// Build the pushdown predicates for a parameter set.
pub fn pushdown_predicates(params: &ScreenParams) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    if params.us_exchanges_only {
        predicates.push(Predicate::is_in(Field::Exchange, US_EXCHANGES.iter().copied()));
    }
    if let Some(price) = params.min_price {
        predicates.push(Predicate::ge(Field::Close, price));
    }
    if let Some(rvol) = params.min_relative_volume {
        predicates.push(Predicate::gt(Field::RelativeVolume, rvol));
    }
    if let Some(change) = params.min_change {
        predicates.push(Predicate::gt(Field::Change, change));
    }
    if let Some(pct) = params.min_sma20_above_pct {
        predicates.push(Predicate::above_pct(Field::Sma20, Field::Close, pct));
    }
    if let Some(pct) = params.max_sma20_above_pct {
        predicates.push(Predicate::below_pct(Field::Sma20, Field::Close, pct));
    }

    predicates
}

/// Local filter flags for a parameter set.
pub fn local_filters(params: &ScreenParams) -> LocalFilters {
    LocalFilters {
        min_atr_pct: params.min_atr_pct,
        max_atr_pct: params.max_atr_pct,
        min_adr_pct: params.min_adr_pct,
        bullish_only: params.bullish_candlestick_patterns_only,
    }
}

/// Compiles parameter sets into provider queries.
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    scan_limit: usize,
}

impl FilterCompiler {
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    pub fn compile(&self, params: &ScreenParams) -> CompiledQuery {
        CompiledQuery {
            scan: ScanQuery {
                columns: Field::SCAN_COLUMNS.to_vec(),
                predicates: pushdown_predicates(params),
                order_by: OrderBy::desc(Field::MarketCap),
                limit: self.scan_limit,
            },
            local: local_filters(params),
        }
    }
}

impl Default for FilterCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_LIMIT)
    }
}
