//! Saved screener records.
//!
//! Records are written by the HTTP surface and read by symbol discovery.
//! `params` is free-form JSON; the only key the service interprets is
//! `symbols`, given either as a comma-separated string or as a list.

pub mod sqlite;

pub use sqlite::SqliteScreenerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

// ============================================================================
// Records
// ============================================================================

/// A saved screener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerRecord {
    pub id: String,
    pub name: String,
    pub owner: String,
    /// Free-text tags
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub params: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when saving a screener.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScreener {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SymbolList {
    Csv(String),
    List(Vec<Option<String>>),
}

impl ScreenerRecord {
    pub fn new(new: NewScreener) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            owner: new.owner,
            tags: new.tags,
            params: new.params,
            created_at: now,
            updated_at: now,
        }
    }

    /// Symbols embedded in `params.symbols`: trimmed, uppercased, empty
    /// entries dropped. Anything else yields nothing.
    pub fn symbols(&self) -> Vec<String> {
        let Some(raw) = self.params.get("symbols") else {
            return Vec::new();
        };

        let entries: Vec<String> = match SymbolList::deserialize(raw) {
            Ok(SymbolList::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
            Ok(SymbolList::List(list)) => list.into_iter().flatten().collect(),
            Err(_) => {
                debug!(id = %self.id, "Ignoring unrecognised symbols value");
                return Vec::new();
            }
        };

        entries
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Case-insensitive match on name, owner or tags.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term)
            || self.owner.to_lowercase().contains(&term)
            || (!self.tags.is_empty() && self.tags.to_lowercase().contains(&term))
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Persistent store for screener records.
#[async_trait]
pub trait ScreenerStore: Send + Sync {
    /// All records, newest first.
    async fn list_screeners(&self) -> Result<Vec<ScreenerRecord>>;

    async fn save_screener(&self, new: NewScreener) -> Result<ScreenerRecord>;

    async fn get_screener(&self, id: &str) -> Result<Option<ScreenerRecord>>;

    /// Returns true if a record was removed.
    async fn delete_screener(&self, id: &str) -> Result<bool>;

    /// Records whose name, owner or tags contain `term`, newest first.
    async fn search_screeners(&self, term: &str) -> Result<Vec<ScreenerRecord>> {
        let mut records = self.list_screeners().await?;
        records.retain(|r| r.matches(term));
        Ok(records)
    }
}

// ============================================================================
// In-memory Store
// ============================================================================

/// Volatile store used when no database is configured.
#[derive(Default)]
pub struct InMemoryScreenerStore {
    records: RwLock<Vec<ScreenerRecord>>,
}

impl InMemoryScreenerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScreenerStore for InMemoryScreenerStore {
    async fn list_screeners(&self) -> Result<Vec<ScreenerRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn save_screener(&self, new: NewScreener) -> Result<ScreenerRecord> {
        let record = ScreenerRecord::new(new);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn get_screener(&self, id: &str) -> Result<Option<ScreenerRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_screener(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}
