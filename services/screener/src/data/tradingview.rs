//! TradingView scanner client.
//!
//! # Endpoints
//! - `POST {base}/{market}/scan` with a column list, filters, sort and range
//!   for bulk scans
//! - the same endpoint with an explicit ticker list for live quotes
//!
//! Tickers are exchange-qualified (`NASDAQ:AAPL`). Live quotes only know bare
//! symbols, so every symbol is tried on NASDAQ, NYSE and AMEX. When several
//! exchanges answer, the earliest in that list wins regardless of the order
//! the rows come back in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use screener_common::config::ProviderConfig;

use super::provider::{MarketDataProvider, ProviderError};
use super::query::{Operand, Operator, Predicate, ScanQuery};
use super::{Field, LiveQuote, ScanRow};

// ============================================================================
// Constants
// ============================================================================

/// Exchanges tried, in order, when resolving a bare symbol to a ticker.
const QUOTE_EXCHANGES: [&str; 3] = ["NASDAQ", "NYSE", "AMEX"];

/// Columns requested for live quotes: price, absolute change, percent change.
const QUOTE_COLUMNS: [&str; 3] = ["close", "change_abs", "change"];

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireFilter {
    left: &'static str,
    operation: &'static str,
    right: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSort {
    sort_by: &'static str,
    sort_order: &'static str,
}

#[derive(Debug, Serialize)]
struct ScanRequest {
    columns: Vec<&'static str>,
    filter: Vec<WireFilter>,
    sort: WireSort,
    range: [usize; 2],
}

#[derive(Debug, Serialize)]
struct WireTickers {
    tickers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QuoteRequest {
    symbols: WireTickers,
    columns: [&'static str; 3],
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(rename = "totalCount", default)]
    total_count: Option<u64>,
    #[serde(default)]
    data: Option<Vec<ScanItem>>,
}

#[derive(Debug, Deserialize)]
struct ScanItem {
    s: String,
    d: Vec<Value>,
}

fn operation(op: Operator) -> &'static str {
    match op {
        Operator::Greater => "greater",
        Operator::GreaterOrEqual => "egreater",
        Operator::Less => "less",
        Operator::LessOrEqual => "eless",
        Operator::Equal => "equal",
        Operator::InSet => "in_range",
        Operator::AbovePct => "above%",
        Operator::BelowPct => "below%",
    }
}

fn operand(value: &Operand) -> Value {
    match value {
        Operand::Number(n) => json!(n),
        Operand::Text(s) => json!(s),
        Operand::Set(items) => json!(items),
        Operand::Relative { reference, pct } => json!([reference.column(), 1.0 + pct / 100.0]),
    }
}

fn encode_filter(predicate: &Predicate) -> WireFilter {
    WireFilter {
        left: predicate.field.column(),
        operation: operation(predicate.operator),
        right: operand(&predicate.operand),
    }
}

fn encode_scan(query: &ScanQuery) -> ScanRequest {
    ScanRequest {
        columns: query.columns.iter().map(|f| f.column()).collect(),
        filter: query.pushdown().map(encode_filter).collect(),
        sort: WireSort {
            sort_by: query.order_by.field.column(),
            sort_order: if query.order_by.descending { "desc" } else { "asc" },
        },
        range: [0, query.limit],
    }
}

/// Decode one `{s, d}` item using the requested column order.
fn decode_row(columns: &[Field], item: ScanItem) -> Result<ScanRow, ProviderError> {
    if item.d.len() != columns.len() {
        return Err(ProviderError::Malformed(format!(
            "row {} has {} values, expected {}",
            item.s,
            item.d.len(),
            columns.len()
        )));
    }

    let mut row = ScanRow {
        ticker: item.s,
        ..Default::default()
    };

    for (field, value) in columns.iter().zip(item.d) {
        match field {
            Field::Name => row.symbol = value.as_str().unwrap_or_default().to_string(),
            Field::Exchange => row.exchange = value.as_str().map(str::to_string),
            Field::Candle(_) => {
                let flag = value
                    .as_bool()
                    .map(|b| if b { 1.0 } else { 0.0 })
                    .or_else(|| value.as_f64());
                row.set_number(*field, flag);
            }
            _ => row.set_number(*field, value.as_f64()),
        }
    }

    if row.symbol.is_empty() {
        row.symbol = bare_symbol(&row.ticker).to_string();
    }
    if row.exchange.is_none() {
        row.exchange = row.ticker.split_once(':').map(|(exchange, _)| exchange.to_string());
    }

    Ok(row)
}

/// Position of the ticker's exchange in `QUOTE_EXCHANGES`; unknown prefixes sort last.
fn exchange_rank(ticker: &str) -> usize {
    ticker
        .split_once(':')
        .and_then(|(exchange, _)| QUOTE_EXCHANGES.iter().position(|e| *e == exchange))
        .unwrap_or(QUOTE_EXCHANGES.len())
}

fn bare_symbol(ticker: &str) -> &str {
    ticker.split_once(':').map_or(ticker, |(_, symbol)| symbol)
}

fn decode_quote(values: &[Value]) -> Option<LiveQuote> {
    match values {
        [price, change, change_percent, ..] => Some(LiveQuote {
            price: price.as_f64()?,
            change: change.as_f64()?,
            change_percent: change_percent.as_f64()?,
        }),
        _ => None,
    }
}

// ============================================================================
// TradingView Client
// ============================================================================

/// HTTP client for the TradingView scanner API.
pub struct TradingViewClient {
    client: reqwest::Client,
    scan_url: String,
}

impl TradingViewClient {
    /// Create a client for `{base_url}/{market}/scan`.
    pub fn new(base_url: &str, market: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            scan_url: format!("{}/{}/scan", base_url.trim_end_matches('/'), market),
        }
    }

    /// Create from provider config
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            &config.base_url,
            &config.market,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<ScanResponse, ProviderError> {
        let response = self
            .client
            .post(&self.scan_url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl MarketDataProvider for TradingViewClient {
    fn name(&self) -> &'static str {
        "tradingview"
    }

    async fn scan(&self, query: &ScanQuery) -> Result<Vec<ScanRow>, ProviderError> {
        let request = encode_scan(query);
        debug!(
            url = %self.scan_url,
            filters = request.filter.len(),
            limit = query.limit,
            "Running scanner query"
        );

        let response = self.post(&request).await?;
        let items = response.data.unwrap_or_default();
        debug!(
            total = response.total_count.unwrap_or(0),
            returned = items.len(),
            "Scanner query complete"
        );

        items
            .into_iter()
            .map(|item| decode_row(&query.columns, item))
            .collect()
    }

    async fn live_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<LiveQuote>>, ProviderError> {
        let mut quotes: HashMap<String, Option<LiveQuote>> = symbols
            .iter()
            .map(|s| (s.trim().to_uppercase(), None))
            .filter(|(s, _)| !s.is_empty())
            .collect();

        if quotes.is_empty() {
            return Ok(quotes);
        }

        let tickers = quotes
            .keys()
            .flat_map(|symbol| {
                QUOTE_EXCHANGES
                    .iter()
                    .map(move |exchange| format!("{exchange}:{symbol}"))
            })
            .collect();

        let request = QuoteRequest {
            symbols: WireTickers { tickers },
            columns: QUOTE_COLUMNS,
        };

        let response = self.post(&request).await?;

        let mut ranks: HashMap<String, usize> = HashMap::new();
        for item in response.data.unwrap_or_default() {
            let symbol = bare_symbol(&item.s).to_uppercase();
            let Some(slot) = quotes.get_mut(&symbol) else {
                continue;
            };
            let rank = exchange_rank(&item.s);
            if ranks.get(&symbol).is_some_and(|best| *best <= rank) {
                continue;
            }
            match decode_quote(&item.d) {
                Some(quote) => {
                    *slot = Some(quote);
                    ranks.insert(symbol, rank);
                }
                None => warn!(ticker = %item.s, "Quote row missing price fields"),
            }
        }

        Ok(quotes)
    }
}
