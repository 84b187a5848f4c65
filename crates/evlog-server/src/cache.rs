use std::sync::Arc;

use tracing::{debug, warn};

use evlog_store::RecordStore;
use evlog_types::{EventRecord, LogId};

use crate::error::{ServerError, ServerResult};

/// Holds at most one loaded record, keyed by its log id.
///
/// Consecutive attribute reads on the same log are served from memory.
/// A read for any other log frees the held record before loading the new
/// one. Not shared: the request loop is the only caller.
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    slot: Option<(LogId, EventRecord)>,
}

impl RecordCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, slot: None }
    }

    /// Return the record for `log_id`, loading it if the slot holds
    /// another log or nothing.
    ///
    /// On a failed load the slot is left empty and `NotFound` is returned.
    pub fn resolve(&mut self, log_id: LogId) -> ServerResult<&EventRecord> {
        if self.cached_id() != Some(log_id) {
            self.release();
            match self.store.load(log_id) {
                Ok(Some(record)) => {
                    debug!(%log_id, "record cached");
                    self.slot = Some((log_id, record));
                }
                Ok(None) => return Err(ServerError::NotFound(log_id)),
                Err(e) => {
                    warn!(%log_id, error = %e, "record load failed");
                    return Err(ServerError::NotFound(log_id));
                }
            }
        }
        self.slot
            .as_ref()
            .map(|(_, record)| record)
            .ok_or(ServerError::NotFound(log_id))
    }

    /// Drop the held record if it belongs to `log_id`.
    pub fn invalidate(&mut self, log_id: LogId) {
        if self.cached_id() == Some(log_id) {
            self.release();
            debug!(%log_id, "cache invalidated");
        }
    }

    /// The log id currently held, if any.
    pub fn cached_id(&self) -> Option<LogId> {
        self.slot.as_ref().map(|(id, _)| *id)
    }

    fn release(&mut self) {
        if let Some((_, record)) = self.slot.take() {
            self.store.free(record);
        }
    }
}

impl Drop for RecordCache {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("cached_id", &self.cached_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_store::InMemoryRecordStore;
    use proptest::prelude::*;

    fn store_with(n: usize) -> (Arc<InMemoryRecordStore>, Vec<LogId>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let ids = (0..n)
            .map(|i| {
                let draft = EventRecord::draft(format!("event {i}"), "Info", "/a", "Test", vec![i as u8]);
                store.create(&draft).unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn repeated_resolve_loads_once() {
        let (store, ids) = store_with(1);
        let mut cache = RecordCache::new(store.clone());
        assert_eq!(cache.resolve(ids[0]).unwrap().message, "event 0");
        assert_eq!(cache.resolve(ids[0]).unwrap().message, "event 0");
        assert_eq!(store.load_count(), 1);
        assert_eq!(cache.cached_id(), Some(ids[0]));
    }

    #[test]
    fn switching_logs_frees_previous() {
        let (store, ids) = store_with(2);
        let mut cache = RecordCache::new(store.clone());
        cache.resolve(ids[0]).unwrap();
        cache.resolve(ids[1]).unwrap();
        cache.resolve(ids[0]).unwrap();
        assert_eq!(store.load_count(), 3);
        assert_eq!(store.free_count(), 2);
    }

    #[test]
    fn missing_log_leaves_slot_empty() {
        let (store, ids) = store_with(1);
        let mut cache = RecordCache::new(store.clone());
        cache.resolve(ids[0]).unwrap();
        let err = cache.resolve(LogId::new(999)).unwrap_err();
        assert!(matches!(err, ServerError::NotFound(id) if id == LogId::new(999)));
        assert_eq!(cache.cached_id(), None);
        assert_eq!(store.free_count(), 1);
    }

    #[test]
    fn invalidate_only_matching_id() {
        let (store, ids) = store_with(2);
        let mut cache = RecordCache::new(store.clone());
        cache.resolve(ids[0]).unwrap();
        cache.invalidate(ids[1]);
        assert_eq!(cache.cached_id(), Some(ids[0]));
        cache.invalidate(ids[0]);
        assert_eq!(cache.cached_id(), None);
        assert_eq!(store.free_count(), 1);
    }

    #[test]
    fn dropping_cache_frees_record() {
        let (store, ids) = store_with(1);
        let mut cache = RecordCache::new(store.clone());
        cache.resolve(ids[0]).unwrap();
        drop(cache);
        assert_eq!(store.free_count(), 1);
    }

    proptest! {
        #[test]
        fn loads_only_on_change_of_log(seq in proptest::collection::vec(0usize..4, 1..40)) {
            let (store, ids) = store_with(4);
            let mut cache = RecordCache::new(store.clone());
            for &i in &seq {
                let record = cache.resolve(ids[i]).unwrap();
                prop_assert_eq!(record.log_id, ids[i]);
            }
            let changes = 1 + seq.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert_eq!(store.load_count(), changes);
            prop_assert_eq!(store.free_count(), changes - 1);
        }
    }
}
