//! Symbol discovery.
//!
//! Collects the symbols the price updater keeps warm: symbols embedded in
//! saved screeners, symbols already in the price cache and a static
//! watch-list. The result is a sorted set, so merging is idempotent and
//! independent of source order.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::PriceCache;
use crate::store::ScreenerStore;

/// Trim and uppercase a symbol; empty input yields `None`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    (!symbol.is_empty()).then_some(symbol)
}

pub struct SymbolDiscovery {
    store: Arc<dyn ScreenerStore>,
    cache: Arc<PriceCache>,
    fallback: Vec<String>,
}

impl SymbolDiscovery {
    pub fn new(store: Arc<dyn ScreenerStore>, cache: Arc<PriceCache>, fallback: Vec<String>) -> Self {
        Self {
            store,
            cache,
            fallback,
        }
    }

    /// Merge every source into one set.
    ///
    /// A store failure is logged and that source contributes nothing.
    pub async fn discover(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();

        match self.store.list_screeners().await {
            Ok(records) => {
                for record in &records {
                    symbols.extend(record.symbols());
                }
                debug!(screeners = records.len(), "Collected screener symbols");
            }
            Err(e) => warn!(error = %e, "Failed to read screeners for symbol discovery"),
        }

        symbols.extend(self.cache.symbols());
        symbols.extend(self.fallback.iter().filter_map(|s| normalize_symbol(s)));

        debug!(count = symbols.len(), "Discovered symbols to watch");
        symbols
    }
}
