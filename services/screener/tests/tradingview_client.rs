//! TradingView client against a mock scanner endpoint.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screener::data::{CandlePattern, Field, MarketDataProvider, ProviderError, TradingViewClient};
use screener::params::ScreenParams;
use screener::screener::FilterCompiler;

fn client(server: &MockServer) -> TradingViewClient {
    TradingViewClient::new(&server.uri(), "america", Duration::from_secs(5))
}

fn scan_values(name: &str, exchange: &str, close: f64, hammer: bool) -> serde_json::Value {
    // name, ATR, ADR, close, volume, exchange, SMA20, rvol, change, market cap, 4 candles
    json!([
        name, 1.5, 1.0, close, 1_200_000, exchange, close * 1.05, 1.7, 3.2, 8.0e9,
        hammer, false, 0, 0
    ])
}

#[tokio::test]
async fn test_scan_sends_filters_and_decodes_rows() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/america/scan"))
        .and(body_partial_json(json!({
            "sort": {"sortBy": "market_cap_basic", "sortOrder": "desc"},
            "range": [0, 1000000],
            "filter": [
                {"left": "exchange", "operation": "in_range"},
                {"left": "close", "operation": "egreater", "right": 1.0},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 2,
            "data": [
                {"s": "NASDAQ:MOMO", "d": scan_values("MOMO", "NASDAQ", 20.0, true)},
                {"s": "NYSE:SWNG", "d": scan_values("SWNG", "NYSE", 50.0, false)},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = ScreenParams::unfiltered();
    params.us_exchanges_only = true;
    params.min_price = Some(1.0);
    let query = FilterCompiler::default().compile(&params).scan;

    let rows = client(&server).scan(&query).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].symbol, "MOMO");
    assert_eq!(rows[0].exchange.as_deref(), Some("NASDAQ"));
    assert_eq!(rows[0].number(Field::Close), Some(20.0));
    assert_eq!(rows[0].number(Field::Atr), Some(1.5));
    assert!(rows[0].pattern(CandlePattern::Hammer));
    assert!(!rows[1].pattern(CandlePattern::Hammer));
    assert!(!rows[1].pattern(CandlePattern::MarubozuWhite));
}

#[tokio::test]
async fn test_scan_with_no_data_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/america/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalCount": 0})))
        .mount(&server)
        .await;

    let query = FilterCompiler::default().compile(&ScreenParams::default()).scan;
    let rows = client(&server).scan(&query).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("scanner unavailable"))
        .mount(&server)
        .await;

    let query = FilterCompiler::default().compile(&ScreenParams::default()).scan;
    let err = client(&server).scan(&query).await.unwrap_err();

    match err {
        ProviderError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "scanner unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let query = FilterCompiler::default().compile(&ScreenParams::default()).scan;
    let err = client(&server).scan(&query).await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: Some(30)
        }
    ));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_malformed_payloads() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let query = FilterCompiler::default().compile(&ScreenParams::default()).scan;
    let err = client(&server).scan(&query).await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn test_short_row_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"s": "NASDAQ:BAD", "d": ["BAD", 1.0]}],
        })))
        .mount(&server)
        .await;

    let query = FilterCompiler::default().compile(&ScreenParams::default()).scan;
    let err = client(&server).scan(&query).await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn test_live_quotes_resolve_bare_symbols() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/america/scan"))
        .and(body_partial_json(json!({"columns": ["close", "change_abs", "change"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"s": "NASDAQ:AAPL", "d": [190.5, 1.5, 0.79]},
                {"s": "NYSE:AAPL", "d": [1.0, 0.0, 0.0]},
                {"s": "NYSE:IBM", "d": [150.0, -2.0, -1.3]},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let symbols = vec!["aapl".to_string(), "IBM".to_string(), "NOPE".to_string()];
    let quotes = client(&server).live_quotes(&symbols).await.unwrap();

    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes["AAPL"].unwrap().price, 190.5);
    assert_eq!(quotes["IBM"].unwrap().change, -2.0);
    assert!(quotes["NOPE"].is_none());
}

#[tokio::test]
async fn test_live_quotes_prefer_exchange_order_over_response_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/america/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"s": "AMEX:DUAL", "d": [3.0, 0.0, 0.0]},
                {"s": "NYSE:DUAL", "d": [2.0, 0.0, 0.0]},
                {"s": "NASDAQ:DUAL", "d": [1.0, 0.0, 0.0]},
                {"s": "AMEX:LATE", "d": [9.0, 0.0, 0.0]},
                {"s": "NYSE:LATE", "d": [8.0, 0.0, 0.0]},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let symbols = vec!["DUAL".to_string(), "LATE".to_string()];
    let quotes = client(&server).live_quotes(&symbols).await.unwrap();

    assert_eq!(quotes["DUAL"].unwrap().price, 1.0);
    assert_eq!(quotes["LATE"].unwrap().price, 8.0);
}

#[tokio::test]
async fn test_live_quotes_without_symbols_skips_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let quotes = client(&server).live_quotes(&[]).await.unwrap();
    assert!(quotes.is_empty());
}
