//! Local record store
//!
//! An id-keyed collection persisted per document. Reads and writes are
//! whole-collection: one JSON document per document id.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::StoreError;

use super::types::DocumentRecords;

/// Persistence for the on-device cache
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Load the cached records for a document
    async fn load(&self, document_id: &str) -> Result<Option<DocumentRecords>, StoreError>;

    /// Replace the cached records for `records.document_id`
    async fn save(&self, records: &DocumentRecords) -> Result<(), StoreError>;

    /// Drop the cached records for a document
    async fn remove(&self, document_id: &str) -> Result<bool, StoreError>;
}

/// SQLite-backed local store
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Open (creating if missing) the database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the records table
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_records (
                document_id TEXT PRIMARY KEY,
                records_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ids of every cached document
    pub async fn document_ids(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT document_id FROM document_records ORDER BY document_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn load(&self, document_id: &str) -> Result<Option<DocumentRecords>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT records_json FROM document_records WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(json,)| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(&self, records: &DocumentRecords) -> Result<(), StoreError> {
        let records_json = serde_json::to_string(records)?;

        sqlx::query(
            r#"
            INSERT INTO document_records (document_id, records_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                records_json = excluded.records_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&records.document_id)
        .bind(&records_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            document_id = %records.document_id,
            highlights = records.highlights.len(),
            notes = records.notes.len(),
            "Saved local records"
        );
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM document_records WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory local store for headless use
#[derive(Default)]
pub struct MemoryLocalStore {
    records: Mutex<HashMap<String, DocumentRecords>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn load(&self, document_id: &str) -> Result<Option<DocumentRecords>, StoreError> {
        Ok(self.records.lock().get(document_id).cloned())
    }

    async fn save(&self, records: &DocumentRecords) -> Result<(), StoreError> {
        self.records
            .lock()
            .insert(records.document_id.clone(), records.clone());
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().remove(document_id).is_some())
    }
}
