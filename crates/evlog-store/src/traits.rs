use evlog_types::{EventRecord, LogId};

use crate::error::StoreResult;

/// Persistent storage of event log records.
///
/// All implementations must satisfy these invariants:
/// - `create` assigns a fresh, nonzero identifier and the creation time; the
///   draft's own `log_id` and `timestamp` are ignored.
/// - A record returned by `load` is exactly what `create` persisted.
/// - Identifiers of live records are unique.
/// - All I/O errors are propagated, never silently ignored.
pub trait RecordStore: Send + Sync {
    /// Persist a draft record and return its assigned identifier.
    ///
    /// Returns `Err(StoreError::AlreadyAssigned)` if the draft already
    /// carries an identifier.
    fn create(&self, draft: &EventRecord) -> StoreResult<LogId>;

    /// Load a record by identifier.
    ///
    /// Returns `Ok(None)` if no record exists for `log_id`.
    fn load(&self, log_id: LogId) -> StoreResult<Option<EventRecord>>;

    /// Release a record previously returned by [`load`](Self::load).
    ///
    /// Backends that keep per-record resources (open handles, buffers)
    /// release them here. The default simply drops the record.
    fn free(&self, record: EventRecord) {
        drop(record);
    }

    /// Delete a record. Returns `true` if the record existed.
    fn delete(&self, log_id: LogId) -> StoreResult<bool>;

    /// Identifiers of every stored record, in ascending order.
    fn log_ids(&self) -> StoreResult<Vec<LogId>>;

    /// The most recently assigned identifier, or `LogId::UNASSIGNED` if none.
    fn latest_log_id(&self) -> LogId;

    /// Number of stored records.
    fn log_count(&self) -> StoreResult<usize> {
        Ok(self.log_ids()?.len())
    }

    /// Total bytes held by the backend for stored records.
    fn managed_size(&self) -> StoreResult<u64>;
}
