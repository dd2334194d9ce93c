//! Screener engine.
//!
//! Orchestrates one screening query: compile parameters, run the bulk scan,
//! apply derived-metric filters and project the result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use screener_common::ErrorReport;

use crate::data::MarketDataProvider;
use crate::error::ScreenerError;
use crate::params::{ScreenParams, ScreenRequest};

use super::compiler::{CompiledQuery, FilterCompiler};
use super::derived::{self, FilterResult, FilterStage};
use super::projector::{self, ResultRow, ResultTable, COLUMNS};
use super::Outcome;

/// Message returned when a screen matches nothing.
pub const NO_RESULTS_MESSAGE: &str = "No symbols found matching the criteria.";

// ============================================================================
// Screen Result
// ============================================================================

/// Terminal outcome of a screen. An empty result is valid, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "table", rename_all = "snake_case")]
pub enum ScreenOutcome {
    Found(ResultTable),
    Empty,
}

/// Result of a screening run.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenResult {
    /// Run ID (timestamp-based)
    pub id: String,
    pub outcome: ScreenOutcome,
    /// Row counts per stage
    pub filter_results: Vec<FilterResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScreenResult {
    pub fn count(&self) -> usize {
        match &self.outcome {
            ScreenOutcome::Found(table) => table.len(),
            ScreenOutcome::Empty => 0,
        }
    }

    pub fn table(&self) -> Option<&ResultTable> {
        match &self.outcome {
            ScreenOutcome::Found(table) => Some(table),
            ScreenOutcome::Empty => None,
        }
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        let fetched = self
            .filter_results
            .first()
            .map_or(0, |r| r.passed);
        format!(
            "Screened {} rows in {:.1}s: {} passed",
            fetched,
            self.duration_secs,
            self.count()
        )
    }
}

// ============================================================================
// Query Response
// ============================================================================

/// Caller-facing response. Failures are folded in with a zero count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl QueryResponse {
    pub fn from_result(result: ScreenResult) -> Self {
        match result.outcome {
            ScreenOutcome::Found(table) => Self {
                success: true,
                message: format!("Found {} symbols!", table.len()),
                count: table.len(),
                columns: table.columns,
                rows: table.rows,
                error: None,
            },
            ScreenOutcome::Empty => Self {
                success: false,
                message: NO_RESULTS_MESSAGE.to_string(),
                count: 0,
                columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                error: None,
            },
        }
    }

    pub fn failure(err: &ScreenerError) -> Self {
        Self {
            success: false,
            message: format!("Error executing query: {}", err),
            count: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(err.report()),
        }
    }
}

// ============================================================================
// Screener Engine
// ============================================================================

/// Runs screening queries against a market data provider.
pub struct ScreenerEngine<P: MarketDataProvider + ?Sized> {
    provider: Arc<P>,
    compiler: FilterCompiler,
}

impl<P: MarketDataProvider + ?Sized> ScreenerEngine<P> {
    pub fn new(provider: Arc<P>, compiler: FilterCompiler) -> Self {
        Self { provider, compiler }
    }

    pub fn compile(&self, params: &ScreenParams) -> CompiledQuery {
        self.compiler.compile(params)
    }

    /// Run a screen. Provider failures are not retried.
    pub async fn run(&self, params: &ScreenParams) -> Result<ScreenResult, ScreenerError> {
        let started_at = Utc::now();
        let id = format!("screen_{}", started_at.format("%Y%m%d_%H%M%S%3f"));
        let compiled = self.compile(params);

        info!(
            screen_id = %id,
            provider = self.provider.name(),
            pushdown = compiled.scan.predicates.len(),
            "Starting screen"
        );

        let rows = self.provider.scan(&compiled.scan).await.map_err(|e| {
            warn!(
                screen_id = %id,
                kind = e.kind(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Provider scan failed"
            );
            ScreenerError::from(e)
        })?;

        let mut filter_results = vec![FilterResult::new(FilterStage::Fetch, rows.len(), rows.len())];
        let (enriched, stages) = derived::apply(Outcome::from_rows(rows), &compiled.local);
        filter_results.extend(stages);

        for stage in &filter_results {
            debug!(
                screen_id = %id,
                stage = %stage.stage,
                passed = stage.passed,
                eliminated = stage.eliminated,
                "Filter stage complete"
            );
        }

        let outcome = match projector::project(enriched) {
            Some(table) => ScreenOutcome::Found(table),
            None => ScreenOutcome::Empty,
        };

        let completed_at = Utc::now();
        let result = ScreenResult {
            id,
            outcome,
            filter_results,
            started_at,
            completed_at,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        };

        info!(screen_id = %result.id, "{}", result.summary());
        Ok(result)
    }

    /// Run a screen and fold any error into the response.
    pub async fn query(&self, params: &ScreenParams) -> QueryResponse {
        match self.run(params).await {
            Ok(result) => QueryResponse::from_result(result),
            Err(e) => QueryResponse::failure(&e),
        }
    }

    /// Resolve a structured request and run it.
    pub async fn query_request(&self, request: ScreenRequest) -> QueryResponse {
        match request.into_params() {
            Ok(params) => self.query(&params).await,
            Err(e) => QueryResponse::failure(&ScreenerError::from(e)),
        }
    }
}
