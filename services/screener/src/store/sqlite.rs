//! SQLite-backed screener store.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;

use super::{NewScreener, ScreenerRecord, ScreenerStore};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS screeners (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    params_json TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_screeners_created
ON screeners(created_at DESC);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, name, owner, tags, params_json, created_at, updated_at FROM screeners";

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ============================================================================
// SqliteScreenerStore
// ============================================================================

/// Screener store persisted in a SQLite file.
pub struct SqliteScreenerStore {
    /// rusqlite::Connection is Send but not Sync
    db: Arc<Mutex<Connection>>,
}

impl SqliteScreenerStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).context("Failed to open screener database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %db_path.display(), "Initialized screener store");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(ScreenerRecord, String)> {
        let created: String = row.get(5)?;
        let updated: String = row.get(6)?;
        let record = ScreenerRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            owner: row.get(2)?,
            tags: row.get(3)?,
            params: serde_json::Value::Null,
            created_at: parse_timestamp(5, &created)?,
            updated_at: parse_timestamp(6, &updated)?,
        };
        Ok((record, row.get(4)?))
    }

    fn finish(raw: (ScreenerRecord, String)) -> Result<ScreenerRecord> {
        let (mut record, params_json) = raw;
        record.params = serde_json::from_str(&params_json)?;
        Ok(record)
    }
}

#[async_trait]
impl ScreenerStore for SqliteScreenerStore {
    async fn list_screeners(&self) -> Result<Vec<ScreenerRecord>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(&format!("{} ORDER BY created_at DESC", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::finish(row?)?);
        }
        Ok(records)
    }

    async fn save_screener(&self, new: NewScreener) -> Result<ScreenerRecord> {
        let record = ScreenerRecord::new(new);
        let params_json = serde_json::to_string(&record.params)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO screeners (id, name, owner, tags, params_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.name,
                record.owner,
                record.tags,
                params_json,
                timestamp(&record.created_at),
                timestamp(&record.updated_at),
            ],
        )?;

        debug!(id = %record.id, name = %record.name, "Saved screener");
        Ok(record)
    }

    async fn get_screener(&self, id: &str) -> Result<Option<ScreenerRecord>> {
        let db = self.db.lock().await;

        let raw = db
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;

        raw.map(Self::finish).transpose()
    }

    async fn delete_screener(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let deleted = db.execute("DELETE FROM screeners WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Ok(false);
        }
        debug!(id, "Deleted screener");
        Ok(true)
    }
}
