// Key-value blob storage behind the snapshot log.
// SQLite keeps one row per key; a save is a single upsert, so readers never see a half-written log.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode log: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable storage port: one opaque blob per key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `None` when nothing was ever saved under `key`.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    /// Replaces the blob under `key` in one step.
    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    pub async fn connect(path: &str) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blob_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    #[instrument(skip(self), fields(repo = "blob_store", operation = "load"))]
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM blob_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    #[instrument(skip(self, value), fields(repo = "blob_store", operation = "save", bytes = value.len()))]
    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO blob_store (key, value, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-process store for tests and embedders without a database.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
