//! Store abstractions for both sides of the sync boundary.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use fieldsync_protocol::{CollectionPath, EntityRecord, RecordQuery, RemoteRecord};

use crate::error::{SyncError, SyncResult};

/// Field assumed to carry the last-modified instant when an entity is not
/// registered explicitly.
pub const DEFAULT_MODIFIED_FIELD: &str = "lastModified";

/// The local relational store.
///
/// Upsert by stable id is the only apply operation the engine uses, which
/// is what makes re-applying a pulled batch idempotent.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read one record by id.
    async fn get(&self, entity: &str, id: i64) -> SyncResult<Option<EntityRecord>>;

    /// Insert or replace a record by id.
    async fn upsert(&self, entity: &str, record: EntityRecord) -> SyncResult<()>;

    /// The local change feed: records whose last-modified instant is
    /// strictly greater than `cursor`, in no particular order.
    async fn changed_since(&self, entity: &str, cursor: i64) -> SyncResult<Vec<EntityRecord>>;
}

/// The remote document store, behind the provider client.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Run one planned query and return the matching documents, ordered
    /// ascending by the query's `order_by` field.
    async fn execute_query(&self, query: &RecordQuery) -> SyncResult<Vec<RemoteRecord>>;

    /// Write one document into a tenant collection, keyed by its id.
    async fn write_record(&self, path: &CollectionPath, record: &RemoteRecord) -> SyncResult<()>;
}

/// In-memory local store.
///
/// Entities registered via [`MemoryLocalStore::with_entity`] use their
/// declared last-modified field for the change feed; unregistered
/// entities fall back to [`DEFAULT_MODIFIED_FIELD`].
#[derive(Default)]
pub struct MemoryLocalStore {
    records: RwLock<HashMap<String, BTreeMap<i64, EntityRecord>>>,
    modified_fields: RwLock<HashMap<String, String>>,
    fail_with: RwLock<Option<String>>,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares which field carries an entity's last-modified instant.
    pub fn with_entity(self, entity: &str, modified_field: &str) -> Self {
        self.modified_fields
            .write()
            .insert(entity.to_string(), modified_field.to_string());
        self
    }

    /// Seeds a record directly, bypassing the sync path.
    pub fn insert(&self, entity: &str, record: EntityRecord) {
        self.records
            .write()
            .entry(entity.to_string())
            .or_default()
            .insert(record.id, record);
    }

    /// Snapshot of all records for an entity, in id order.
    pub fn records(&self, entity: &str) -> Vec<EntityRecord> {
        self.records
            .read()
            .get(entity)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records stored for an entity.
    pub fn len(&self, entity: &str) -> usize {
        self.records.read().get(entity).map_or(0, BTreeMap::len)
    }

    /// Makes every subsequent operation fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.write() = Some(message.into());
    }

    /// Clears a previously injected failure.
    pub fn clear_failure(&self) {
        *self.fail_with.write() = None;
    }

    fn check_failure(&self) -> SyncResult<()> {
        match self.fail_with.read().clone() {
            Some(message) => Err(SyncError::LocalStore(message)),
            None => Ok(()),
        }
    }

    fn modified_field(&self, entity: &str) -> String {
        self.modified_fields
            .read()
            .get(entity)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MODIFIED_FIELD.to_string())
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, entity: &str, id: i64) -> SyncResult<Option<EntityRecord>> {
        self.check_failure()?;
        Ok(self
            .records
            .read()
            .get(entity)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    async fn upsert(&self, entity: &str, record: EntityRecord) -> SyncResult<()> {
        self.check_failure()?;
        self.insert(entity, record);
        Ok(())
    }

    async fn changed_since(&self, entity: &str, cursor: i64) -> SyncResult<Vec<EntityRecord>> {
        self.check_failure()?;
        let field = self.modified_field(entity);
        Ok(self
            .records
            .read()
            .get(entity)
            .map(|rows| {
                rows.values()
                    .filter(|record| {
                        record.last_modified(&field).is_some_and(|m| m > cursor)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Scripted remote store for unit tests.
///
/// Query responses are served in FIFO order; once the script runs out,
/// further queries return empty result sets. Writes are recorded for
/// assertions.
#[derive(Default)]
pub struct MockRemoteStore {
    responses: Mutex<VecDeque<SyncResult<Vec<RemoteRecord>>>>,
    writes: Mutex<Vec<(String, RemoteRecord)>>,
    queries: Mutex<Vec<RecordQuery>>,
    fail_write: RwLock<Option<String>>,
}

impl MockRemoteStore {
    /// Creates a store with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful query response.
    pub fn push_response(&self, records: Vec<RemoteRecord>) {
        self.responses.lock().push_back(Ok(records));
    }

    /// Queues a failing query response.
    pub fn push_error(&self, error: SyncError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Makes every subsequent write fail with the given message.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.fail_write.write() = Some(message.into());
    }

    /// The document writes performed so far, as (path, record) pairs.
    pub fn writes(&self) -> Vec<(String, RemoteRecord)> {
        self.writes.lock().clone()
    }

    /// The queries executed so far.
    pub fn queries(&self) -> Vec<RecordQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn execute_query(&self, query: &RecordQuery) -> SyncResult<Vec<RemoteRecord>> {
        self.queries.lock().push(query.clone());
        match self.responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(Vec::new()),
        }
    }

    async fn write_record(&self, path: &CollectionPath, record: &RemoteRecord) -> SyncResult<()> {
        if let Some(message) = self.fail_write.read().clone() {
            return Err(SyncError::write_retryable(message));
        }
        self.writes
            .lock()
            .push((path.record_path(record.id), record.clone()));
        Ok(())
    }
}
