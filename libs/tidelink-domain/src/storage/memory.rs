//! In-memory adapters
//!
//! Implementations of [`ObjectFetcher`] and [`RecordStore`] backed by process
//! memory. They back the test suites and local replays; the record store can
//! be scripted to throttle or reject records to exercise partial failures.
//!
//! Both types are cheap handles: clones share the same underlying state, so a
//! test can keep one clone for assertions while the service owns another.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::{FetchError, ObjectFetcher, RecordStore, StoreError, WriteOutcome};
use crate::record::{Fields, RecordKey, ValidatedRecord};

type ObjectId = (String, String);

#[derive(Debug, Default)]
struct ObjectState {
    objects: HashMap<ObjectId, Bytes>,
    denied: HashSet<ObjectId>,
    fetches: usize,
}

/// Object store holding raw batches in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<ObjectState>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `bucket`/`key`, replacing any previous object
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state()
            .objects
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Make fetches of `bucket`/`key` fail with `AccessDenied`
    pub fn deny(&self, bucket: &str, key: &str) {
        self.state()
            .denied
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Number of fetch calls served so far
    pub fn fetches(&self) -> usize {
        self.state().fetches
    }

    fn state(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectFetcher for InMemoryObjectStore {
    fn fetch(
        &self,
        store_location_id: &str,
        object_key: &str,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
        let id = (store_location_id.to_string(), object_key.to_string());
        let result = {
            let mut state = self.state();
            state.fetches += 1;
            if state.denied.contains(&id) {
                Err(FetchError::AccessDenied(format!("{}/{}", id.0, id.1)))
            } else {
                state
                    .objects
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| FetchError::NotFound(format!("{}/{}", id.0, id.1)))
            }
        };

        async move { result }
    }
}

#[derive(Debug, Default)]
struct RecordState {
    tables: HashMap<String, BTreeMap<RecordKey, Fields>>,
    batch_sizes: Vec<usize>,
    scripted: VecDeque<StoreError>,
    throttled: HashMap<String, u32>,
    rejected: HashMap<String, String>,
    failing: HashMap<String, StoreError>,
}

/// Table store holding upserted records in memory
#[derive(Debug, Clone)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<RecordState>>,
    max_batch_size: usize,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            max_batch_size: 25,
        }
    }
}

impl InMemoryRecordStore {
    /// Create an empty store accepting up to 25 records per request
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the per-request record limit
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Fail the next requests, one per scripted error, before touching any record
    pub fn script_failures(&self, failures: impl IntoIterator<Item = StoreError>) {
        self.state().scripted.extend(failures);
    }

    /// Report records of `partition_key` as throttled the next `times` times one is sent
    ///
    /// The count goes down once per record, not once per request.
    pub fn throttle_partition(&self, partition_key: &str, times: u32) {
        self.state()
            .throttled
            .insert(partition_key.to_string(), times);
    }

    /// Reject every record of `partition_key` with `reason`
    pub fn reject_partition(&self, partition_key: &str, reason: &str) {
        self.state()
            .rejected
            .insert(partition_key.to_string(), reason.to_string());
    }

    /// Fail, with `err`, every request that carries a record of `partition_key`
    ///
    /// Nothing in a failed request is written.
    pub fn fail_partition(&self, partition_key: &str, err: StoreError) {
        self.state()
            .failing
            .insert(partition_key.to_string(), err);
    }

    /// Get the stored fields for `key` in `table`
    pub fn get(&self, table: &str, key: &RecordKey) -> Option<Fields> {
        self.state()
            .tables
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    /// Copy of the whole table, ordered by key
    pub fn snapshot(&self, table: &str) -> BTreeMap<RecordKey, Fields> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Number of records stored in `table`
    pub fn len(&self, table: &str) -> usize {
        self.state().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Whether `table` holds no records
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Size of every request received, in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    /// Number of requests received
    pub fn calls(&self) -> usize {
        self.state().batch_sizes.len()
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn upsert_batch(
        &self,
        table: &str,
        records: &[ValidatedRecord],
    ) -> impl Future<Output = Result<Vec<WriteOutcome>, StoreError>> + Send {
        let result = {
            let mut guard = self.state();
            let state = &mut *guard;
            state.batch_sizes.push(records.len());

            let failing = records
                .iter()
                .find_map(|record| state.failing.get(record.partition_key()).cloned());

            match state.scripted.pop_front().or(failing) {
                Some(err) => Err(err),
                None => {
                    let rows = state.tables.entry(table.to_string()).or_default();
                    let outcomes = records
                        .iter()
                        .map(|record| {
                            if let Some(reason) = state.rejected.get(record.partition_key()) {
                                return WriteOutcome::Rejected(reason.clone());
                            }
                            if let Some(remaining) = state.throttled.get_mut(record.partition_key()) {
                                if *remaining > 0 {
                                    *remaining -= 1;
                                    return WriteOutcome::Throttled;
                                }
                            }
                            rows.insert(record.key().clone(), record.fields().clone());
                            WriteOutcome::Written
                        })
                        .collect();
                    Ok(outcomes)
                }
            }
        };

        async move { result }
    }
}
