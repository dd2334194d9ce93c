//! Screening pipeline.
//!
//! ```text
//! ScreenParams ──▶ FilterCompiler ──▶ provider scan ──▶ derived metrics ──▶ projector
//!                  (pushdown +                          (ATR%, ADR%,         (fixed
//!                   local filters)                       patterns)            columns)
//! ```
//!
//! Any stage that ends with zero rows yields an explicit empty outcome and
//! the remaining stages are skipped.

pub mod compiler;
pub mod derived;
pub mod engine;
pub mod projector;

pub use compiler::{CompiledQuery, FilterCompiler, LocalFilters, DEFAULT_SCAN_LIMIT};
pub use derived::{EnrichedRow, FilterResult, FilterStage};
pub use engine::{QueryResponse, ScreenOutcome, ScreenResult, ScreenerEngine};
pub use projector::{ResultRow, ResultTable, COLUMNS};

/// Rows flowing between pipeline stages, or the marker that none are left.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Always non-empty
    Rows(Vec<T>),
    Empty,
}

impl<T> Outcome<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        if rows.is_empty() {
            Self::Empty
        } else {
            Self::Rows(rows)
        }
    }

    pub fn map_rows<U>(self, f: impl FnMut(T) -> U) -> Outcome<U> {
        match self {
            Self::Rows(rows) => Outcome::Rows(rows.into_iter().map(f).collect()),
            Self::Empty => Outcome::Empty,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
