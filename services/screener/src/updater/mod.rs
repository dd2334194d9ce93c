//! Background price updater.
//!
//! A single tokio task keeps the price cache warm:
//!
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!                        │
//!                        ▼
//!     discover ─▶ live quotes ─▶ upsert ─▶ stats ─▶ (every Nth) evict ─▶ sleep
//!                        │
//!                     on error ─▶ errors += 1 ─▶ backoff sleep
//! ```
//!
//! Sleeps race against a cancellation channel, so `stop()` wakes the worker
//! immediately. An in-flight provider call is not interrupted; `stop()` waits
//! for it up to the join timeout and then detaches. A detached worker exits
//! after that call without recording statistics.

pub mod discovery;

pub use discovery::{normalize_symbol, SymbolDiscovery};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use screener_common::config::{UpdaterConfig, MAX_CACHE_TTL_HOURS, MIN_UPDATE_INTERVAL_SECS};

use crate::data::{MarketDataProvider, PriceCache};
use crate::error::ScreenerError;

// ============================================================================
// Settings & Statistics
// ============================================================================

/// Timing knobs for the refresh loop.
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    pub interval: Duration,
    pub error_backoff: Duration,
    /// Evict stale cache entries every this many successful iterations
    pub eviction_every: u64,
    pub cache_ttl: chrono::Duration,
    pub join_timeout: Duration,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self::from(&UpdaterConfig::default())
    }
}

impl From<&UpdaterConfig> for UpdaterSettings {
    fn from(config: &UpdaterConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            eviction_every: config.eviction_every.max(1),
            cache_ttl: cache_ttl(config.cache_ttl_hours),
            join_timeout: Duration::from_secs(config.join_timeout_secs),
        }
    }
}

/// Snapshot of the updater's run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdaterStats {
    pub total_updates: u64,
    pub last_update_time: Option<DateTime<Utc>>,
    pub symbols_updated: usize,
    pub errors: u64,
    pub running: bool,
    /// Seconds
    pub update_interval: u64,
}

#[derive(Debug, Default)]
struct RunStats {
    total_updates: u64,
    last_update_time: Option<DateTime<Utc>>,
    symbols_updated: usize,
    errors: u64,
}

/// What one refresh pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReport {
    /// Discovery found nothing to refresh
    Skipped,
    Updated { requested: usize, updated: usize },
}

/// Hours past the accepted maximum are capped rather than overflowing.
fn cache_ttl(hours: u64) -> chrono::Duration {
    let hours = hours.min(MAX_CACHE_TTL_HOURS);
    i64::try_from(hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .unwrap_or(chrono::Duration::MAX)
}

fn clamp_interval(seconds: u64) -> u64 {
    seconds.max(MIN_UPDATE_INTERVAL_SECS)
}

// ============================================================================
// Shared Worker State
// ============================================================================

struct Shared<P: MarketDataProvider + ?Sized> {
    provider: Arc<P>,
    cache: Arc<PriceCache>,
    discovery: SymbolDiscovery,
    settings: UpdaterSettings,
    interval_secs: AtomicU64,
    running: AtomicBool,
    /// Bumped on every start and stop. A worker whose generation is stale
    /// no longer touches `running` or the statistics.
    generation: AtomicU64,
    stats: RwLock<RunStats>,
}

/// Resets `running` when the worker exits, including by panic.
struct RunningGuard<P: MarketDataProvider + ?Sized> {
    shared: Arc<Shared<P>>,
    generation: u64,
}

impl<P: MarketDataProvider + ?Sized> Drop for RunningGuard<P> {
    fn drop(&mut self) {
        if self.shared.is_current(self.generation) {
            self.shared.running.store(false, Ordering::SeqCst);
        }
    }
}

impl<P: MarketDataProvider + ?Sized> Shared<P> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::SeqCst))
    }

    async fn refresh_once(&self) -> Result<RefreshReport, ScreenerError> {
        let symbols = self.discovery.discover().await;
        if symbols.is_empty() {
            warn!("No symbols to update");
            return Ok(RefreshReport::Skipped);
        }

        let requested = symbols.len();
        let symbols: Vec<String> = symbols.into_iter().collect();
        debug!(count = requested, "Refreshing prices");

        let quotes = self
            .provider
            .live_quotes(&symbols)
            .await
            .map_err(|e| {
                debug!(
                    kind = e.kind(),
                    recoverable = e.is_recoverable(),
                    "Live quote request failed"
                );
                ScreenerError::RefreshLoop(e.to_string())
            })?;

        let mut updated = 0;
        for (symbol, quote) in &quotes {
            if let Some(quote) = quote {
                self.cache.upsert_quote(symbol, quote);
                updated += 1;
            }
        }

        info!(updated, requested, "Updated cached prices");
        Ok(RefreshReport::Updated { requested, updated })
    }

    async fn record_success(&self, updated: usize) {
        let total = {
            let mut stats = self.stats.write().await;
            stats.total_updates += 1;
            stats.last_update_time = Some(Utc::now());
            stats.symbols_updated = updated;
            stats.total_updates
        };

        if total % self.settings.eviction_every == 0 {
            let evicted = self.cache.evict_older_than(self.settings.cache_ttl);
            info!(evicted, iteration = total, "Evicted stale cached prices");
        }
    }

    async fn record_error(&self, error: &ScreenerError) {
        let errors = {
            let mut stats = self.stats.write().await;
            stats.errors += 1;
            stats.errors
        };
        warn!(
            error = %error,
            errors,
            backoff_secs = self.settings.error_backoff.as_secs(),
            "Price update failed"
        );
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>, generation: u64) {
        let _guard = RunningGuard {
            shared: Arc::clone(&self),
            generation,
        };
        info!(interval_secs = self.interval().as_secs(), "Price updater loop started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let outcome = self.refresh_once().await;
            if !self.is_current(generation) {
                debug!(generation, "Detached price updater discarding its last pass");
                break;
            }

            let pause = match outcome {
                Ok(RefreshReport::Updated { updated, .. }) => {
                    self.record_success(updated).await;
                    self.interval()
                }
                Ok(RefreshReport::Skipped) => self.interval(),
                Err(e) => {
                    self.record_error(&e).await;
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        info!("Price updater loop exited");
    }
}

// ============================================================================
// Price Updater
// ============================================================================

struct Worker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Owns the background refresh task.
pub struct PriceUpdater<P: MarketDataProvider + ?Sized + 'static> {
    shared: Arc<Shared<P>>,
    worker: Mutex<Option<Worker>>,
}

impl<P: MarketDataProvider + ?Sized + 'static> PriceUpdater<P> {
    pub fn new(
        provider: Arc<P>,
        cache: Arc<PriceCache>,
        discovery: SymbolDiscovery,
        settings: UpdaterSettings,
    ) -> Self {
        let interval_secs = clamp_interval(settings.interval.as_secs());
        Self {
            shared: Arc::new(Shared {
                provider,
                cache,
                discovery,
                settings,
                interval_secs: AtomicU64::new(interval_secs),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                stats: RwLock::new(RunStats::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Spawn the worker. No-op if it is already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if self.is_running() {
            debug!("Price updater already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(shared.run(shutdown_rx, generation));

        *worker = Some(Worker {
            handle,
            shutdown: shutdown_tx,
        });
        info!(
            interval_secs = self.update_interval(),
            "Background price updater started"
        );
    }

    /// Signal the worker and wait (bounded) for it to exit.
    ///
    /// The updater reports stopped afterwards whether or not the join
    /// completed in time.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        let Some(Worker { handle, shutdown }) = worker else {
            return;
        };
        let _ = shutdown.send(true);

        let timeout = self.shared.settings.join_timeout;
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Price updater task ended abnormally"),
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "Price updater did not stop in time; detaching"
            ),
        }
        info!("Background price updater stopped");
    }

    /// Change the refresh interval, clamped to the minimum. Takes effect at
    /// the next sleep. Returns the interval in effect.
    pub fn set_update_interval(&self, seconds: u64) -> u64 {
        let seconds = clamp_interval(seconds);
        self.shared.interval_secs.store(seconds, Ordering::SeqCst);
        info!(interval_secs = seconds, "Price update interval changed");
        seconds
    }

    /// Current refresh interval in seconds.
    pub fn update_interval(&self) -> u64 {
        self.shared.interval_secs.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> UpdaterStats {
        let stats = self.shared.stats.read().await;
        UpdaterStats {
            total_updates: stats.total_updates,
            last_update_time: stats.last_update_time,
            symbols_updated: stats.symbols_updated,
            errors: stats.errors,
            running: self.is_running(),
            update_interval: self.update_interval(),
        }
    }

    /// Run one refresh pass on the caller's task. Statistics are left alone.
    pub async fn refresh_now(&self) -> Result<RefreshReport, ScreenerError> {
        self.shared.refresh_once().await
    }
}
