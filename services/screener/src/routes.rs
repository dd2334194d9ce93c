//! HTTP routes for the screener service.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use screener_common::{Error as ServiceError, ErrorReport};

use crate::data::{CacheStats, CachedPrice};
use crate::error::ScreenerError;
use crate::params::{InvalidParameter, ParamInfo, ScreenRequest, PARAMS};
use crate::screener::QueryResponse;
use crate::store::{NewScreener, ScreenerRecord};
use crate::updater::{RefreshReport, UpdaterStats};
use crate::AppState;

/// Request body cap for JSON endpoints.
const MAX_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub prices: Vec<CachedPrice>,
    pub count: usize,
    /// Requested symbols with no cached entry
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub requested: usize,
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct ScreenersResponse {
    pub screeners: Vec<ScreenerRecord>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// Comma-separated symbols; all cached entries when absent
    pub symbols: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct IntervalResponse {
    pub update_interval: u64,
}

/// Error body: `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    report: ErrorReport,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self {
            status: StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            report: ErrorReport::from(&err),
        }
    }
}

impl From<ScreenerError> for ApiError {
    fn from(err: ScreenerError) -> Self {
        let status = match &err {
            ScreenerError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ScreenerError::ProviderFailure(_) | ScreenerError::RefreshLoop(_) => {
                StatusCode::BAD_GATEWAY
            }
            ScreenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            report: err.report(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.report })),
        )
            .into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = Duration::from_secs(state.config.provider.timeout_secs.saturating_mul(3));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/params", get(list_params))
        .route("/api/v1/query", post(run_query))
        .route("/api/v1/prices", get(get_prices))
        .route("/api/v1/prices/stats", get(price_cache_stats))
        .route("/api/v1/prices/refresh", post(refresh_prices))
        .route("/api/v1/updater/status", get(updater_status))
        .route("/api/v1/updater/start", post(updater_start))
        .route("/api/v1/updater/stop", post(updater_stop))
        .route("/api/v1/updater/interval", post(set_update_interval))
        .route("/api/v1/screeners", get(list_screeners).post(save_screener))
        .route(
            "/api/v1/screeners/:id",
            get(get_screener).delete(delete_screener),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "screener".to_string(),
    })
}

/// Ordered parameter list with prompts and defaults
pub async fn list_params() -> Json<Vec<ParamInfo>> {
    Json(PARAMS.iter().map(ParamInfo::from).collect())
}

/// Run a screen. Always answers with a `QueryResponse`.
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScreenRequest>, JsonRejection>,
) -> (StatusCode, Json<QueryResponse>) {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = ScreenerError::from(InvalidParameter::MalformedRequest(
                rejection.body_text(),
            ));
            return (StatusCode::BAD_REQUEST, Json(QueryResponse::failure(&err)));
        }
    };

    let params = match request.into_params() {
        Ok(params) => params,
        Err(e) => {
            let err = ScreenerError::from(e);
            return (StatusCode::BAD_REQUEST, Json(QueryResponse::failure(&err)));
        }
    };

    let response = state.engine.query(&params).await;
    let status = match &response.error {
        Some(report) if report.kind == "provider_failure" => StatusCode::BAD_GATEWAY,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
        None => StatusCode::OK,
    };
    (status, Json(response))
}

/// Cached prices. An explicit `symbols` list must name at least one symbol.
pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<PricesResponse>, ApiError> {
    let requested: Vec<String> = match query.symbols.as_deref() {
        Some(raw) => {
            let symbols: Vec<String> = raw
                .split(',')
                .filter_map(crate::updater::normalize_symbol)
                .collect();
            if symbols.is_empty() {
                let err = ServiceError::InvalidInput(format!("no symbols in {:?}", raw));
                return Err(err.into());
            }
            symbols
        }
        None => state.cache.symbols(),
    };

    let found = state.cache.get_many(&requested);
    let missing = requested
        .iter()
        .filter(|s| !found.contains_key(*s))
        .cloned()
        .collect();
    let mut prices: Vec<CachedPrice> = found.into_values().collect();
    prices.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    Ok(Json(PricesResponse {
        count: prices.len(),
        prices,
        missing,
    }))
}

/// Fresh and stale entry counts against the cache TTL
pub async fn price_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Run one refresh pass now
pub async fn refresh_prices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let response = match state.updater.refresh_now().await? {
        RefreshReport::Skipped => RefreshResponse {
            requested: 0,
            updated: 0,
        },
        RefreshReport::Updated { requested, updated } => RefreshResponse { requested, updated },
    };
    Ok(Json(response))
}

/// Updater run statistics
pub async fn updater_status(State(state): State<Arc<AppState>>) -> Json<UpdaterStats> {
    Json(state.updater.stats().await)
}

pub async fn updater_start(State(state): State<Arc<AppState>>) -> Json<UpdaterStats> {
    state.updater.start().await;
    Json(state.updater.stats().await)
}

pub async fn updater_stop(State(state): State<Arc<AppState>>) -> Json<UpdaterStats> {
    state.updater.stop().await;
    Json(state.updater.stats().await)
}

pub async fn set_update_interval(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntervalRequest>,
) -> Json<IntervalResponse> {
    Json(IntervalResponse {
        update_interval: state.updater.set_update_interval(request.seconds),
    })
}

/// List saved screeners, optionally filtered by a search term
pub async fn list_screeners(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ScreenersResponse>, ApiError> {
    let screeners = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => state.store.search_screeners(term).await?,
        _ => state.store.list_screeners().await?,
    };
    Ok(Json(ScreenersResponse {
        count: screeners.len(),
        screeners,
    }))
}

pub async fn save_screener(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewScreener>,
) -> Result<(StatusCode, Json<ScreenerRecord>), ApiError> {
    let record = state.store.save_screener(new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_screener(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScreenerRecord>, ApiError> {
    state
        .store
        .get_screener(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("screener {}", id)).into())
}

pub async fn delete_screener(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_screener(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound(format!("screener {}", id)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Field, LiveQuote, MarketDataProvider, ProviderError, ScanQuery, ScanRow};
    use crate::store::InMemoryScreenerStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use screener_common::Config;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    struct FixtureProvider;

    #[async_trait]
    impl MarketDataProvider for FixtureProvider {
        fn name(&self) -> &'static str {
            "fixture"
        }

        async fn scan(&self, query: &ScanQuery) -> Result<Vec<ScanRow>, ProviderError> {
            let rows = vec![
                ScanRow::new("NASDAQ", "AAPL").with(Field::Close, 190.0),
                ScanRow::new("NYSE", "IBM").with(Field::Close, 150.0),
            ];
            Ok(rows.into_iter().filter(|r| query.accepts(r)).collect())
        }

        async fn live_quotes(
            &self,
            symbols: &[String],
        ) -> Result<HashMap<String, Option<LiveQuote>>, ProviderError> {
            Ok(symbols
                .iter()
                .map(|s| {
                    let quote = LiveQuote {
                        price: 100.0,
                        change: 1.0,
                        change_percent: 1.0,
                    };
                    (s.clone(), Some(quote))
                })
                .collect())
        }
    }

    fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.updater.fallback_symbols = vec!["AAPL".into()];
        Arc::new(AppState::new(
            config,
            Arc::new(FixtureProvider),
            Arc::new(InMemoryScreenerStore::new()),
        ))
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = build_router(test_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_params_in_order() {
        let response = build_router(test_state())
            .oneshot(Request::builder().uri("/api/v1/params").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let params = body_json(response).await;
        let params = params.as_array().unwrap();
        assert_eq!(params.len(), 10);
        assert_eq!(params[0]["name"], "us_exchanges_only");
        assert_eq!(params[9]["name"], "bullish_candlestick_patterns_only");
    }

    #[tokio::test]
    async fn test_query_without_filters() {
        let body = json!({
            "us_exchanges_only": null,
            "min_price": null,
            "min_relative_volume": null,
            "min_change": null,
            "min_sma20_above_pct": null,
            "max_sma20_above_pct": null,
            "min_atr_pct": null,
            "max_atr_pct": null,
            "min_adr_pct": null,
            "bullish_candlestick_patterns_only": null,
        });
        let response = build_router(test_state())
            .oneshot(post_json("/api/v1/query", &body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert_eq!(json["message"], "Found 2 symbols!");
    }

    #[tokio::test]
    async fn test_query_malformed_body() {
        let response = build_router(test_state())
            .oneshot(post_json("/api/v1/query", r#"{"min_price": "#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "invalid_parameter");
    }

    #[tokio::test]
    async fn test_query_unknown_field() {
        let response = build_router(test_state())
            .oneshot(post_json("/api/v1/query", r#"{"max_price": 5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_then_read_prices() {
        let state = test_state();

        let response = build_router(Arc::clone(&state))
            .oneshot(post_json("/api/v1/prices/refresh", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["updated"], 1);

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/prices?symbols=aapl,zzzz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["prices"][0]["symbol"], "AAPL");
        assert_eq!(json["missing"], json!(["ZZZZ"]));
    }

    #[tokio::test]
    async fn test_prices_with_empty_symbol_list_rejected() {
        let response = build_router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/v1/prices?symbols=,%20,")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_price_cache_stats() {
        let state = test_state();
        state.cache.upsert("AAPL", 190.0, 1.0, 0.5);
        state.cache.restore(CachedPrice {
            symbol: "OLD".into(),
            price: 1.0,
            change: 0.0,
            change_percent: 0.0,
            updated_at: chrono::Utc::now() - chrono::Duration::days(2),
        });

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/prices/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"total_entries": 2, "stale_entries": 1, "fresh_entries": 1})
        );
    }

    #[tokio::test]
    async fn test_update_interval_is_clamped() {
        let response = build_router(test_state())
            .oneshot(post_json("/api/v1/updater/interval", r#"{"seconds": 3}"#))
            .await
            .unwrap();

        assert_eq!(body_json(response).await["update_interval"], 10);
    }

    #[tokio::test]
    async fn test_updater_start_and_stop() {
        let state = test_state();

        let response = build_router(Arc::clone(&state))
            .oneshot(post_json("/api/v1/updater/start", ""))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["running"], true);

        let response = build_router(state)
            .oneshot(post_json("/api/v1/updater/stop", ""))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["running"], false);
    }

    #[tokio::test]
    async fn test_screener_crud() {
        let state = test_state();

        let response = build_router(Arc::clone(&state))
            .oneshot(post_json(
                "/api/v1/screeners",
                r#"{"name": "Momentum", "owner": "dana", "params": {"symbols": "tsla"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = build_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .uri("/api/v1/screeners?search=moment")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["count"], 1);

        let uri = format!("/api/v1/screeners/{}", id);
        let response = build_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = build_router(state)
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["kind"], "not_found");
    }
}
