use evlog_bus::Slot;
use evlog_types::{LogId, ObjectPath};

use crate::error::{ServerError, ServerResult};

/// What a bus registration stands for. The bus hands the target back with
/// every request addressed to the registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The records root and its ingestion/clear methods.
    Root,
    /// The read-only attributes of one log.
    Record(LogId),
    /// The delete capability of one log.
    Delete(LogId),
}

/// One live, bus-visible log. Dropping the entry withdraws both of its
/// interfaces from the bus.
#[derive(Debug)]
pub struct PublishedLogEntry {
    log_id: LogId,
    path: ObjectPath,
    _record: Slot<Target>,
    _delete: Slot<Target>,
}

impl PublishedLogEntry {
    pub fn new(log_id: LogId, path: ObjectPath, record: Slot<Target>, delete: Slot<Target>) -> Self {
        Self {
            log_id,
            path,
            _record: record,
            _delete: delete,
        }
    }

    pub fn log_id(&self) -> LogId {
        self.log_id
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }
}

/// Published logs in insertion order, unique by log id.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<PublishedLogEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: PublishedLogEntry) -> ServerResult<()> {
        if self.contains(entry.log_id) {
            return Err(ServerError::AlreadyPublished(entry.log_id));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, log_id: LogId) -> Option<&PublishedLogEntry> {
        self.entries.iter().find(|e| e.log_id == log_id)
    }

    pub fn contains(&self, log_id: LogId) -> bool {
        self.get(log_id).is_some()
    }

    /// Take an entry out of the registry. The caller decides when its
    /// registrations are released by dropping it.
    pub fn remove(&mut self, log_id: LogId) -> Option<PublishedLogEntry> {
        let index = self.entries.iter().position(|e| e.log_id == log_id)?;
        Some(self.entries.remove(index))
    }

    /// Snapshot of the live ids, in insertion order.
    pub fn ids(&self) -> Vec<LogId> {
        self.entries.iter().map(|e| e.log_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublishedLogEntry> {
        self.entries.iter()
    }
}
