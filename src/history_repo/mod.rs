// Snapshot history: an append-only log held as a single JSON blob, bounded by age and count.
// The repo holds no state between calls; every append loads, prunes and rewrites the whole blob.

pub mod aggregation;
mod blob;
mod retention;
mod store;

pub use retention::{
    DEFAULT_MAX_AGE_HOURS, DEFAULT_MAX_ENTRIES, PruneStats, RetentionPolicy, apply_retention,
};
pub use store::{BlobStore, MemoryBlobStore, SqliteBlobStore, StorageError};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::models::Snapshot;

/// Fixed storage key the log blob lives under.
pub const DEFAULT_STORAGE_KEY: &str = "sensorDataLog";

/// Result of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Entries in the log after the append.
    pub len: usize,
    pub pruned: PruneStats,
    /// The previous blob could not be parsed and was replaced.
    pub recovered_from_corruption: bool,
}

pub struct HistoryRepo {
    store: Arc<dyn BlobStore>,
    key: String,
    policy: RetentionPolicy,
}

impl HistoryRepo {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>, policy: RetentionPolicy) -> Self {
        Self {
            store,
            key: key.into(),
            policy,
        }
    }

    /// In-memory repo with the default key and retention.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBlobStore::new()),
            DEFAULT_STORAGE_KEY,
            RetentionPolicy::default(),
        )
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub async fn append(&self, snapshot: Snapshot) -> Result<AppendOutcome, StorageError> {
        self.append_at(snapshot, Utc::now()).await
    }

    /// Appends `snapshot`, evaluating the age cutoff against `now`.
    ///
    /// A corrupt blob is treated as an empty log. A backend read error aborts the
    /// append before anything is written.
    #[instrument(skip(self, snapshot), fields(repo = "history", operation = "append"))]
    pub async fn append_at(
        &self,
        snapshot: Snapshot,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StorageError> {
        let (log, corrupt) = self.load().await?;
        let (log, pruned) = apply_retention(log, snapshot, now, &self.policy);
        let bytes = blob::encode_log(&log)?;
        self.store.save(&self.key, &bytes).await?;

        if pruned.expired > 0 || pruned.evicted > 0 {
            tracing::debug!(
                expired = pruned.expired,
                evicted = pruned.evicted,
                retained = log.len(),
                "history pruned"
            );
        }
        Ok(AppendOutcome {
            len: log.len(),
            pruned,
            recovered_from_corruption: corrupt,
        })
    }

    /// The persisted log as stored; empty when absent or corrupt.
    #[instrument(skip(self), fields(repo = "history", operation = "read_all"))]
    pub async fn read_all(&self) -> Result<Vec<Snapshot>, StorageError> {
        let (log, _) = self.load().await?;
        Ok(log)
    }

    async fn load(&self) -> Result<(Vec<Snapshot>, bool), StorageError> {
        match self.store.load(&self.key).await? {
            Some(bytes) => {
                let decoded = blob::decode_log(&bytes);
                Ok((decoded.entries, decoded.corrupt))
            }
            None => Ok((Vec::new(), false)),
        }
    }
}
