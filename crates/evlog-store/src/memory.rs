use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use evlog_types::{EventRecord, LogId};

use crate::alloc::next_free_id;
use crate::error::{StoreError, StoreResult};
use crate::traits::RecordStore;

struct MemoryState {
    records: BTreeMap<LogId, EventRecord>,
    latest: LogId,
}

/// In-memory, BTreeMap-based record store.
///
/// Intended for tests and embedding. Records are cloned on load. The store
/// counts loads and frees so callers can observe how often the backend was
/// reached.
pub struct InMemoryRecordStore {
    state: RwLock<MemoryState>,
    loads: AtomicUsize,
    frees: AtomicUsize,
    read_only: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                records: BTreeMap::new(),
                latest: LogId::UNASSIGNED,
            }),
            loads: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            read_only: AtomicBool::new(false),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").records.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().expect("lock poisoned").records.is_empty()
    }

    /// How many times [`RecordStore::load`] has been called.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// How many times [`RecordStore::free`] has been called.
    pub fn free_count(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    /// Make `create` and `delete` fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, draft: &EventRecord) -> StoreResult<LogId> {
        if !draft.is_draft() {
            return Err(StoreError::AlreadyAssigned(draft.log_id));
        }
        self.check_writable()?;

        let mut state = self.state.write().expect("lock poisoned");
        let log_id = next_free_id(state.latest, |id| state.records.contains_key(&id))?;
        let record = draft.clone().assigned(log_id, Utc::now());
        state.records.insert(log_id, record);
        state.latest = log_id;
        Ok(log_id)
    }

    fn load(&self, log_id: LogId) -> StoreResult<Option<EventRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().expect("lock poisoned");
        Ok(state.records.get(&log_id).cloned())
    }

    fn free(&self, record: EventRecord) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        drop(record);
    }

    fn delete(&self, log_id: LogId) -> StoreResult<bool> {
        self.check_writable()?;
        let mut state = self.state.write().expect("lock poisoned");
        Ok(state.records.remove(&log_id).is_some())
    }

    fn log_ids(&self) -> StoreResult<Vec<LogId>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.records.keys().copied().collect())
    }

    fn latest_log_id(&self) -> LogId {
        self.state.read().expect("lock poisoned").latest
    }

    fn managed_size(&self) -> StoreResult<u64> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .records
            .values()
            .map(|rec| rec.debug_data.len() as u64)
            .sum())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .field("loads", &self.load_count())
            .finish()
    }
}
