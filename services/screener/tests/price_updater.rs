//! Background price updater behaviour under paused tokio time.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use screener::data::{
    CachedPrice, LiveQuote, MarketDataProvider, PriceCache, ProviderError, ScanQuery, ScanRow,
};
use screener::store::{InMemoryScreenerStore, NewScreener, ScreenerStore};
use screener::updater::{PriceUpdater, RefreshReport, SymbolDiscovery, UpdaterSettings};

// ============================================================================
// Test Provider
// ============================================================================

/// Quotes every requested symbol except those in `unquoted`, failing the
/// first `failures` calls.
struct RecordingProvider {
    calls: Mutex<Vec<(Instant, Vec<String>)>>,
    failures: AtomicU32,
    unquoted: Vec<String>,
}

impl RecordingProvider {
    fn new() -> Arc<Self> {
        Self::with(0, Vec::new())
    }

    fn with(failures: u32, unquoted: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failures: AtomicU32::new(failures),
            unquoted,
        })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    fn gaps(&self) -> Vec<Duration> {
        self.call_times().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl MarketDataProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn scan(&self, _query: &ScanQuery) -> Result<Vec<ScanRow>, ProviderError> {
        Ok(Vec::new())
    }

    async fn live_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<LiveQuote>>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), symbols.to_vec()));

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Network("connection reset".into()));
        }

        Ok(symbols
            .iter()
            .map(|s| {
                let quote = (!self.unquoted.contains(s)).then_some(LiveQuote {
                    price: 42.0,
                    change: 0.5,
                    change_percent: 1.2,
                });
                (s.clone(), quote)
            })
            .collect())
    }
}

/// First call hangs for `stall`; later calls answer at once.
struct StalledProvider {
    calls: AtomicU32,
    stall: Duration,
}

impl StalledProvider {
    fn new(stall: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            stall,
        })
    }
}

#[async_trait]
impl MarketDataProvider for StalledProvider {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn scan(&self, _query: &ScanQuery) -> Result<Vec<ScanRow>, ProviderError> {
        Ok(Vec::new())
    }

    async fn live_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<LiveQuote>>, ProviderError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.stall).await;
        }
        Ok(symbols
            .iter()
            .map(|s| {
                let quote = LiveQuote {
                    price: 10.0,
                    change: 0.0,
                    change_percent: 0.0,
                };
                (s.clone(), Some(quote))
            })
            .collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn settings(interval_secs: u64) -> UpdaterSettings {
    UpdaterSettings {
        interval: Duration::from_secs(interval_secs),
        ..UpdaterSettings::default()
    }
}

fn updater<P: MarketDataProvider + 'static>(
    provider: Arc<P>,
    cache: Arc<PriceCache>,
    settings: UpdaterSettings,
) -> PriceUpdater<P> {
    let store: Arc<dyn ScreenerStore> = Arc::new(InMemoryScreenerStore::new());
    let discovery = SymbolDiscovery::new(store, Arc::clone(&cache), vec!["AAPL".into()]);
    PriceUpdater::new(provider, cache, discovery, settings)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_clamped_interval_drives_sleeps() {
    let provider = RecordingProvider::new();
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(30));

    assert_eq!(updater.set_update_interval(5), 10);
    updater.start().await;
    tokio::time::sleep(Duration::from_secs(35)).await;
    updater.stop().await;

    assert_eq!(provider.call_times().len(), 4);
    assert!(provider.gaps().iter().all(|gap| *gap == Duration::from_secs(10)));

    let stats = updater.stats().await;
    assert_eq!(stats.total_updates, 4);
    assert_eq!(stats.symbols_updated, 1);
    assert_eq!(stats.update_interval, 10);
    assert!(stats.last_update_time.is_some());
    assert!(!stats.running);
}

#[tokio::test(start_paused = true)]
async fn test_error_backs_off_then_recovers() {
    let provider = RecordingProvider::with(1, Vec::new());
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(30));

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(95)).await;
    updater.stop().await;

    assert_eq!(
        provider.gaps(),
        vec![Duration::from_secs(60), Duration::from_secs(30)]
    );

    let stats = updater.stats().await;
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.total_updates, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_entries_evicted_on_48th_iteration() {
    let provider = RecordingProvider::with(0, vec!["OLD".into()]);
    let cache = Arc::new(PriceCache::new());
    cache.restore(CachedPrice {
        symbol: "OLD".into(),
        price: 1.0,
        change: 0.0,
        change_percent: 0.0,
        updated_at: Utc::now() - chrono::Duration::hours(25),
    });

    let updater = updater(Arc::clone(&provider), Arc::clone(&cache), settings(10));
    updater.start().await;

    // Iterations run at t = 0, 10, ..., so the 47th completes at 460s.
    tokio::time::sleep(Duration::from_secs(465)).await;
    assert_eq!(updater.stats().await.total_updates, 47);
    assert!(cache.get("OLD").is_some());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(updater.stats().await.total_updates, 48);
    assert!(cache.get("OLD").is_none());
    assert!(cache.get("AAPL").is_some());

    updater.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_sleep() {
    let provider = RecordingProvider::new();
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(3600));

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(updater.is_running());

    let stopping = Instant::now();
    updater.stop().await;

    assert!(stopping.elapsed() < Duration::from_secs(1));
    assert!(!updater.is_running());
    assert_eq!(provider.call_times().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_detaches_stalled_worker_after_join_timeout() {
    let provider = StalledProvider::new(Duration::from_secs(30));
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(3600));

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stopping = Instant::now();
    updater.stop().await;
    assert_eq!(stopping.elapsed(), Duration::from_secs(5));
    assert!(!updater.is_running());

    // The detached worker finishes its call at t = 30 and must leave no trace.
    tokio::time::sleep(Duration::from_secs(40)).await;
    let stats = updater.stats().await;
    assert_eq!(stats.total_updates, 0);
    assert_eq!(stats.errors, 0);
    assert!(stats.last_update_time.is_none());
    assert!(!stats.running);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_outlives_detached_worker() {
    let provider = StalledProvider::new(Duration::from_secs(30));
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(3600));

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    updater.stop().await;

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(40)).await;

    // Only the new worker's pass counts, and the old worker's exit at
    // t = 30 does not flip the new run to stopped.
    assert!(updater.is_running());
    assert_eq!(updater.stats().await.total_updates, 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    updater.stop().await;
    assert!(!updater.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let provider = RecordingProvider::new();
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(10));

    updater.start().await;
    updater.start().await;
    tokio::time::sleep(Duration::from_secs(25)).await;
    updater.stop().await;

    assert_eq!(provider.call_times().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let provider = RecordingProvider::new();
    let updater = updater(Arc::clone(&provider), Arc::new(PriceCache::new()), settings(10));

    updater.start().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    updater.stop().await;

    updater.start().await;
    assert!(updater.is_running());
    tokio::time::sleep(Duration::from_secs(5)).await;
    updater.stop().await;

    assert_eq!(provider.call_times().len(), 2);
    assert_eq!(updater.stats().await.total_updates, 2);
}

#[tokio::test]
async fn test_discovery_merges_screener_symbols() {
    let store = Arc::new(InMemoryScreenerStore::new());
    for symbols in [json!("AAPL,MSFT"), json!(["msft", "goog"])] {
        store
            .save_screener(NewScreener {
                name: "watch".into(),
                owner: "erin".into(),
                tags: String::new(),
                params: json!({ "symbols": symbols }),
            })
            .await
            .unwrap();
    }

    let cache = Arc::new(PriceCache::new());
    let discovery = SymbolDiscovery::new(store, Arc::clone(&cache), Vec::new());
    let symbols: Vec<String> = discovery.discover().await.into_iter().collect();
    assert_eq!(symbols, vec!["AAPL", "GOOG", "MSFT"]);

    let provider = RecordingProvider::new();
    let updater = PriceUpdater::new(
        Arc::clone(&provider),
        Arc::clone(&cache),
        discovery,
        UpdaterSettings::default(),
    );

    let report = updater.refresh_now().await.unwrap();
    assert_eq!(
        report,
        RefreshReport::Updated {
            requested: 3,
            updated: 3
        }
    );
    assert_eq!(cache.symbols(), vec!["AAPL", "GOOG", "MSFT"]);

    let calls = provider.calls.lock().unwrap();
    assert_eq!(calls[0].1, vec!["AAPL", "GOOG", "MSFT"]);
    drop(calls);

    // Manual refreshes leave the loop statistics alone.
    assert_eq!(updater.stats().await.total_updates, 0);
}

#[tokio::test]
async fn test_nothing_to_refresh_is_skipped() {
    let store: Arc<dyn ScreenerStore> = Arc::new(InMemoryScreenerStore::new());
    let cache = Arc::new(PriceCache::new());
    let discovery = SymbolDiscovery::new(store, Arc::clone(&cache), Vec::new());
    let provider = RecordingProvider::new();
    let updater = PriceUpdater::new(Arc::clone(&provider), cache, discovery, UpdaterSettings::default());

    assert_eq!(updater.refresh_now().await.unwrap(), RefreshReport::Skipped);
    assert!(provider.call_times().is_empty());
}
