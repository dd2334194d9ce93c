//! Screener Library
//!
//! A parameterized stock screener over the TradingView scanner, plus a
//! background task that keeps a price cache warm for the symbols users care
//! about.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       screener (Rust Service)                       │
//! │                               :4480                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Parameters     │  │  Screener       │  │  Price          │      │
//! │  │  (defaults,     │─▶│  Engine         │  │  Updater        │      │
//! │  │   parsing)      │  │                 │  │                 │      │
//! │  └─────────────────┘  └────────┬────────┘  └───┬─────────┬───┘      │
//! │                                │               │         │          │
//! │                       ┌────────▼───────────────▼──┐  ┌───▼──────┐   │
//! │                       │  Market Data Provider     │  │  Price   │   │
//! │                       │  (TradingView scanner)    │  │  Cache   │   │
//! │                       └───────────────────────────┘  └──────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Pushdown vs. local filters
//! - Exchange, price, relative volume, change and SMA20 bands are sent to
//!   the provider with the scan
//! - ATR%, ADR% and the bullish candle filter are computed on the returned
//!   rows
//!
//! ## Price refresh
//! - Symbols come from saved screeners, the cache itself and a watch-list
//! - Entries older than the cache TTL are swept every Nth iteration

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod params;
pub mod routes;
pub mod screener;
pub mod store;
pub mod updater;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use screener_common::config::Config;

use crate::data::{MarketDataProvider, PriceCache, TradingViewClient};
use crate::screener::{FilterCompiler, ScreenerEngine};
use crate::store::{InMemoryScreenerStore, ScreenerStore, SqliteScreenerStore};
use crate::updater::{PriceUpdater, SymbolDiscovery, UpdaterSettings};

/// Shared service state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Screening pipeline
    pub engine: ScreenerEngine<dyn MarketDataProvider>,
    /// Latest known prices
    pub cache: Arc<PriceCache>,
    /// Background cache refresher
    pub updater: PriceUpdater<dyn MarketDataProvider>,
    /// Saved screeners
    pub store: Arc<dyn ScreenerStore>,
}

impl AppState {
    /// Wire the components around an explicit provider and store.
    pub fn new(
        config: Config,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn ScreenerStore>,
    ) -> Self {
        let settings = UpdaterSettings::from(&config.updater);
        let cache = Arc::new(PriceCache::with_ttl(settings.cache_ttl));

        let engine = ScreenerEngine::new(
            Arc::clone(&provider),
            FilterCompiler::new(config.provider.scan_limit),
        );

        let discovery = SymbolDiscovery::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            config.updater.fallback_symbols.clone(),
        );
        let updater = PriceUpdater::new(provider, Arc::clone(&cache), discovery, settings);

        Self {
            config,
            engine,
            cache,
            updater,
            store,
        }
    }

    /// Build state from configuration: TradingView provider, and a SQLite
    /// store when `storage.db_path` is set (in-memory otherwise).
    pub fn from_config(config: Config) -> Result<Self> {
        let provider: Arc<dyn MarketDataProvider> =
            Arc::new(TradingViewClient::from_config(&config.provider));

        let store: Arc<dyn ScreenerStore> = match &config.storage.db_path {
            Some(path) => Arc::new(
                SqliteScreenerStore::open(path).context("Failed to open screener store")?,
            ),
            None => {
                tracing::info!("No database configured, keeping screeners in memory");
                Arc::new(InMemoryScreenerStore::new())
            }
        };

        Ok(Self::new(config, provider, store))
    }
}

/// Main screener service
pub struct ScreenerService {
    state: Arc<AppState>,
}

impl ScreenerService {
    /// Create a new screener service
    pub fn new(config: Config) -> Result<Self> {
        let state = Arc::new(AppState::from_config(config)?);
        Ok(Self { state })
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Start the updater (if enabled) and serve HTTP until Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let network = &self.state.config.network;
        let addr: SocketAddr = format!("{}:{}", network.bind, network.port)
            .parse()
            .context("Invalid bind address")?;

        let app = routes::build_router(Arc::clone(&self.state));

        if self.state.config.updater.enabled {
            self.state.updater.start().await;
        } else {
            tracing::info!("Price updater disabled by configuration");
        }

        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.updater.stop().await;
        tracing::info!("Screener service stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
