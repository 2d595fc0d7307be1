//! Query-evaluating in-memory remote store.
//!
//! Unlike the scripted mock in the engine crate, this store actually
//! evaluates query predicates against seeded documents, so integration
//! tests exercise the same filtering the provider would apply.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use fieldsync_engine::{RemoteStore, SyncError, SyncResult};
use fieldsync_protocol::{CollectionPath, RecordQuery, RemoteRecord};

/// In-memory remote document store.
///
/// Documents live under their collection path. Queries filter through
/// [`RecordQuery::admits`] and return matches ordered ascending by the
/// query's `order_by` field, ties broken by id; documents without the
/// order field sort first. Writes land in the store, so a pushed record
/// is visible to the next query.
#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<HashMap<String, BTreeMap<i64, RemoteRecord>>>,
    executed: Mutex<Vec<RecordQuery>>,
    writes: Mutex<Vec<(String, RemoteRecord)>>,
    queries_served: AtomicUsize,
    fail_query_after: RwLock<Option<(usize, String)>>,
    fail_writes: RwLock<Option<String>>,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one document.
    pub fn seed(&self, collection: &CollectionPath, record: RemoteRecord) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(record.id, record);
    }

    /// Seeds many documents into one collection.
    pub fn seed_many(
        &self,
        collection: &CollectionPath,
        records: impl IntoIterator<Item = RemoteRecord>,
    ) {
        let mut collections = self.collections.write();
        let rows = collections.entry(collection.to_string()).or_default();
        for record in records {
            rows.insert(record.id, record);
        }
    }

    /// Snapshot of one collection, in id order.
    pub fn records(&self, collection: &CollectionPath) -> Vec<RemoteRecord> {
        self.collections
            .read()
            .get(&collection.to_string())
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in one collection.
    pub fn len(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .get(&collection.to_string())
            .map_or(0, BTreeMap::len)
    }

    /// The queries executed so far.
    pub fn executed_queries(&self) -> Vec<RecordQuery> {
        self.executed.lock().clone()
    }

    /// The writes performed so far, as (document path, record) pairs.
    pub fn writes(&self) -> Vec<(String, RemoteRecord)> {
        self.writes.lock().clone()
    }

    /// Lets the first `n` queries succeed, then fails the rest with the
    /// given message. Counts queries across all collections.
    pub fn fail_queries_after(&self, n: usize, message: impl Into<String>) {
        *self.fail_query_after.write() = Some((n, message.into()));
    }

    /// Makes every subsequent write fail with the given message.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.fail_writes.write() = Some(message.into());
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        *self.fail_query_after.write() = None;
        *self.fail_writes.write() = None;
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn execute_query(&self, query: &RecordQuery) -> SyncResult<Vec<RemoteRecord>> {
        self.executed.lock().push(query.clone());
        let served = self.queries_served.fetch_add(1, Ordering::SeqCst);
        if let Some((after, message)) = self.fail_query_after.read().clone() {
            if served >= after {
                return Err(SyncError::fetch_retryable(message));
            }
        }

        let mut matches: Vec<RemoteRecord> = self
            .collections
            .read()
            .get(&query.collection.to_string())
            .map(|rows| {
                rows.values()
                    .filter(|record| query.admits(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by_key(|record| {
            (
                record.last_modified(&query.order_by).unwrap_or(i64::MIN),
                record.id,
            )
        });
        Ok(matches)
    }

    async fn write_record(&self, path: &CollectionPath, record: &RemoteRecord) -> SyncResult<()> {
        if let Some(message) = self.fail_writes.read().clone() {
            return Err(SyncError::write_retryable(message));
        }
        self.writes
            .lock()
            .push((path.record_path(record.id), record.clone()));
        self.collections
            .write()
            .entry(path.to_string())
            .or_default()
            .insert(record.id, record.clone());
        Ok(())
    }
}
