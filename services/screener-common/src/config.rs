//! Configuration management for the screener service.
//!
//! The service reads a single JSON file at `~/.screener/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (SCREENER_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SCREENER_BIND_ADDRESS` → network.bind
//! - `SCREENER_PORT` → network.port
//! - `SCREENER_LOG_LEVEL` → observability.log_level
//! - `SCREENER_LOG_FORMAT` → observability.log_format
//! - `SCREENER_UPDATE_INTERVAL` → updater.interval_secs
//! - `SCREENER_PROVIDER_URL` → provider.base_url
//! - `SCREENER_DB_PATH` → storage.db_path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Smallest refresh interval the price updater accepts.
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 10;

/// Longest cache TTL the price updater accepts (100 years).
pub const MAX_CACHE_TTL_HOURS: u64 = 876_000;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".screener"),
        |dirs| dirs.home_dir().join(".screener"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure for the screener service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP bind address and port
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Market-data provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Background price updater settings
    #[serde(default)]
    pub updater: UpdaterConfig,

    /// Screener record storage
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored and the existing value kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SCREENER_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("SCREENER_PORT").and_then(|p| p.parse().ok()) {
            self.network.port = port;
        }
        if let Some(level) = lookup("SCREENER_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("SCREENER_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(secs) = lookup("SCREENER_UPDATE_INTERVAL").and_then(|s| s.parse().ok()) {
            self.updater.interval_secs = secs;
        }
        if let Some(url) = lookup("SCREENER_PROVIDER_URL") {
            self.provider.base_url = url;
        }
        if let Some(path) = lookup("SCREENER_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }
    }
}

// ============================================================================
// Network Configuration
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to quiet down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Market-data provider (TradingView scanner) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Scanner base URL, without the market path segment
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Market path segment (e.g., "america")
    #[serde(default = "default_market")]
    pub market: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Maximum rows requested by a bulk scan
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            market: default_market(),
            timeout_secs: default_provider_timeout(),
            scan_limit: default_scan_limit(),
        }
    }
}

fn default_provider_url() -> String {
    "https://scanner.tradingview.com".to_string()
}

fn default_market() -> String {
    "america".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_scan_limit() -> usize {
    1_000_000
}

// ============================================================================
// Updater Configuration
// ============================================================================

/// Background price updater settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Start the updater when the service boots
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between successful refresh iterations (minimum 10)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds to wait after a failed iteration
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Cache entries older than this are evicted by the periodic sweep
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// Run the eviction sweep every N successful iterations
    #[serde(default = "default_eviction_every")]
    pub eviction_every: u64,

    /// Upper bound on how long `stop` waits for the worker
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,

    /// Symbols always tracked, regardless of saved screeners
    #[serde(default = "default_fallback_symbols")]
    pub fallback_symbols: Vec<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            cache_ttl_hours: default_cache_ttl_hours(),
            eviction_every: default_eviction_every(),
            join_timeout_secs: default_join_timeout_secs(),
            fallback_symbols: default_fallback_symbols(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_eviction_every() -> u64 {
    48
}

fn default_join_timeout_secs() -> u64 {
    5
}

fn default_fallback_symbols() -> Vec<String> {
    [
        "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "AMD", "INTC", "CRM",
        "ADBE", "PYPL", "NKE", "DIS", "JPM", "V", "WMT", "PG", "JNJ", "UNH", "HD", "MA", "BAC",
        "PFE", "ABT", "KO", "PEP", "TMO", "ABBV", "MRK", "AVGO", "COST", "ACN", "DHR", "NEE",
        "LLY", "TXN", "UNP", "RTX", "HON", "QCOM", "LOW", "UPS", "IBM", "CAT", "SPGI", "GS",
        "MS", "AMGN", "ISRG", "GILD", "T", "DE", "PLD", "ADI", "CME",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Screener record storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database path. When unset, records are kept in memory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}
