//! Price cache.
//!
//! Last-known price and change per symbol with the time of the last update.
//! Entries are overwritten wholesale by `upsert` and removed in batches by
//! `evict_older_than`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::LiveQuote;

/// Default time-to-live for cached prices (24 hours).
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// A cached price entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPrice {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub updated_at: DateTime<Utc>,
}

/// In-memory price cache keyed by uppercased symbol.
pub struct PriceCache {
    entries: RwLock<HashMap<String, CachedPrice>>,
    ttl: Duration,
}

impl PriceCache {
    /// Create a new price cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_TTL_HOURS))
    }

    /// Create with custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CachedPrice>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedPrice>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the cached entry for a symbol
    pub fn get(&self, symbol: &str) -> Option<CachedPrice> {
        self.read().get(&Self::key(symbol)).cloned()
    }

    /// Get cached entries for several symbols; misses are left out.
    pub fn get_many<S: AsRef<str>>(&self, symbols: &[S]) -> HashMap<String, CachedPrice> {
        let entries = self.read();
        symbols
            .iter()
            .filter_map(|s| {
                let key = Self::key(s.as_ref());
                entries.get(&key).map(|entry| (key, entry.clone()))
            })
            .collect()
    }

    /// Insert or fully overwrite the entry for a symbol.
    ///
    /// The stored timestamp never moves backwards, even if the wall clock does.
    pub fn upsert(&self, symbol: &str, price: f64, change: f64, change_percent: f64) -> CachedPrice {
        let key = Self::key(symbol);
        let mut entries = self.write();

        let now = Utc::now();
        let updated_at = entries
            .get(&key)
            .map_or(now, |previous| previous.updated_at.max(now));

        let entry = CachedPrice {
            symbol: key.clone(),
            price,
            change,
            change_percent,
            updated_at,
        };
        entries.insert(key, entry.clone());
        entry
    }

    /// Upsert from a live quote
    pub fn upsert_quote(&self, symbol: &str, quote: &LiveQuote) -> CachedPrice {
        self.upsert(symbol, quote.price, quote.change, quote.change_percent)
    }

    /// Put back an entry with its own timestamp, e.g. when warming from a snapshot.
    pub fn restore(&self, entry: CachedPrice) {
        let key = Self::key(&entry.symbol);
        self.write().insert(
            key.clone(),
            CachedPrice {
                symbol: key,
                ..entry
            },
        );
    }

    /// Remove every entry last updated before `now - age`. Returns the number removed.
    ///
    /// An age reaching past the earliest representable time evicts nothing.
    pub fn evict_older_than(&self, age: Duration) -> usize {
        match Utc::now().checked_sub_signed(age) {
            Some(cutoff) => self.evict_before(cutoff),
            None => 0,
        }
    }

    /// Remove every entry last updated strictly before `cutoff`.
    pub fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.updated_at >= cutoff);
        before - entries.len()
    }

    /// Remove entries older than the configured TTL
    pub fn evict_stale(&self) -> usize {
        self.evict_older_than(self.ttl)
    }

    /// All cached symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let cutoff = Utc::now().checked_sub_signed(self.ttl);
        let entries = self.read();
        let total = entries.len();
        let stale = match cutoff {
            Some(cutoff) => entries.values().filter(|e| e.updated_at < cutoff).count(),
            None => 0,
        };

        CacheStats {
            total_entries: total,
            stale_entries: stale,
            fresh_entries: total - stale,
        }
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub stale_entries: usize,
    pub fresh_entries: usize,
}

// ============================================================================
// Tests
// ============================================================================
