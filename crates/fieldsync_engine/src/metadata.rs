//! Durable per-(entity, direction) sync cursors and run statistics.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Metadata key the runner records whole-cycle summaries under.
pub const GLOBAL_SYNC: &str = "global_sync";

/// Which way records moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncDirection {
    /// Remote to local.
    Pull,
    /// Local to remote.
    Push,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Pull => write!(f, "pull"),
            SyncDirection::Push => write!(f, "push"),
        }
    }
}

/// One durable cursor row: where a sync direction of one entity type left
/// off, plus the statistics of its latest run.
///
/// `last_timestamp_millis` is the high-water mark of record last-modified
/// instants moved so far; 0 means never synced. Successful runs only ever
/// move it forward, failed runs leave it alone, and rows disappear only
/// through an explicit reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Entity type this row belongs to.
    pub entity: String,
    /// Direction this row belongs to.
    pub direction: SyncDirection,
    /// High-water mark over record last-modified instants, epoch millis.
    pub last_timestamp_millis: i64,
    /// Records moved by the latest run.
    pub last_run_record_count: u64,
    /// Wall-clock duration of the latest run, millis.
    pub last_run_duration_ms: u64,
    /// Approximate bytes moved by the latest run.
    pub bytes_transferred: u64,
    /// Error that ended the latest run, if it failed.
    pub last_error: Option<String>,
    /// When this row was recorded, epoch millis.
    pub updated_at: i64,
}

impl SyncCursor {
    /// Row for a successful run that advanced the cursor to `timestamp`.
    pub fn success(
        entity: impl Into<String>,
        direction: SyncDirection,
        timestamp: i64,
        records: u64,
        duration_ms: u64,
        bytes: u64,
    ) -> Self {
        Self {
            entity: entity.into(),
            direction,
            last_timestamp_millis: timestamp,
            last_run_record_count: records,
            last_run_duration_ms: duration_ms,
            bytes_transferred: bytes,
            last_error: None,
            updated_at: Utc::now().timestamp_millis(),
        }
    }

    /// Row for a failed run: keeps the previous cursor, records the error
    /// and whatever partial statistics the run accumulated.
    pub fn failure(
        entity: impl Into<String>,
        direction: SyncDirection,
        previous_timestamp: i64,
        records: u64,
        duration_ms: u64,
        bytes: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            direction,
            last_timestamp_millis: previous_timestamp,
            last_run_record_count: records,
            last_run_duration_ms: duration_ms,
            bytes_transferred: bytes,
            last_error: Some(error.into()),
            updated_at: Utc::now().timestamp_millis(),
        }
    }

    /// Whether the latest run succeeded.
    pub fn succeeded(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Durable store for sync cursors.
///
/// One row per (entity, direction), upserted atomically as the final step
/// of a run. Rows survive everything except an explicit reset.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// The cursor row for an entity and direction, if one was ever
    /// recorded.
    async fn cursor(&self, entity: &str, direction: SyncDirection)
        -> SyncResult<Option<SyncCursor>>;

    /// Upsert the row for the run that just finished.
    async fn record_run(&self, cursor: SyncCursor) -> SyncResult<()>;

    /// Remove both direction rows for an entity.
    async fn reset(&self, entity: &str) -> SyncResult<()>;

    /// Remove every row (tenant sign-out, forced full resync).
    async fn reset_all(&self) -> SyncResult<()>;

    /// The cursor timestamp for an entity and direction, 0 when absent.
    async fn last_timestamp(&self, entity: &str, direction: SyncDirection) -> SyncResult<i64> {
        Ok(self
            .cursor(entity, direction)
            .await?
            .map(|row| row.last_timestamp_millis)
            .unwrap_or(0))
    }
}

/// In-memory metadata store.
#[derive(Default)]
pub struct MemoryMetadataStore {
    rows: RwLock<HashMap<(String, SyncDirection), SyncCursor>>,
    fail_writes: RwLock<Option<String>>,
}

impl MemoryMetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `record_run` fail with the given message.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.fail_writes.write() = Some(message.into());
    }

    /// Clears a previously injected write failure.
    pub fn clear_write_failure(&self) {
        *self.fail_writes.write() = None;
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn cursor(
        &self,
        entity: &str,
        direction: SyncDirection,
    ) -> SyncResult<Option<SyncCursor>> {
        Ok(self
            .rows
            .read()
            .get(&(entity.to_string(), direction))
            .cloned())
    }

    async fn record_run(&self, cursor: SyncCursor) -> SyncResult<()> {
        if let Some(message) = self.fail_writes.read().clone() {
            return Err(SyncError::MetadataWrite(message));
        }
        self.rows
            .write()
            .insert((cursor.entity.clone(), cursor.direction), cursor);
        Ok(())
    }

    async fn reset(&self, entity: &str) -> SyncResult<()> {
        let mut rows = self.rows.write();
        rows.remove(&(entity.to_string(), SyncDirection::Pull));
        rows.remove(&(entity.to_string(), SyncDirection::Push));
        Ok(())
    }

    async fn reset_all(&self) -> SyncResult<()> {
        self.rows.write().clear();
        Ok(())
    }
}
