use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of one stored event log.
///
/// Identifiers are 16 bits wide. The value `0` is reserved to mean
/// "unassigned": drafts carry it, and a store that could not allocate an
/// identifier reports it to callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(u16);

impl LogId {
    /// The reserved "no identifier" value.
    pub const UNASSIGNED: LogId = LogId(0);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns `true` for every identifier except [`LogId::UNASSIGNED`].
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }

    /// The identifier following this one, wrapping from `u16::MAX` back to 1
    /// so that the unassigned value is never produced.
    pub fn next_wrapping(self) -> Self {
        match self.0.checked_add(1) {
            Some(next) => Self(next),
            None => Self(1),
        }
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .map(Self)
            .map_err(|_| TypeError::InvalidLogId(s.to_string()))
    }
}

impl From<u16> for LogId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// The full content of one event log.
///
/// Records are immutable once stored. A record built by a producer is a
/// *draft*: its `log_id` is [`LogId::UNASSIGNED`] and its `timestamp` is the
/// epoch. The store fills in both when it persists the draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// One-sentence description of the event.
    pub message: String,
    /// How bad the event is (free text, e.g. `Critical`, `Info`).
    pub severity: String,
    /// Path(s) of the affected resource(s).
    pub association: String,
    /// Origin label of the submitter.
    pub reported_by: String,
    /// Opaque developer debug data.
    pub debug_data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub log_id: LogId,
}

impl EventRecord {
    /// Build a draft record with no identifier and no timestamp.
    pub fn draft(
        message: impl Into<String>,
        severity: impl Into<String>,
        association: impl Into<String>,
        reported_by: impl Into<String>,
        debug_data: Vec<u8>,
    ) -> Self {
        Self {
            message: message.into(),
            severity: severity.into(),
            association: association.into(),
            reported_by: reported_by.into(),
            debug_data,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            log_id: LogId::UNASSIGNED,
        }
    }

    /// Stamp this record with its assigned identifier and creation time.
    pub fn assigned(mut self, log_id: LogId, timestamp: DateTime<Utc>) -> Self {
        self.log_id = log_id;
        self.timestamp = timestamp;
        self
    }

    /// Returns `true` if the record has not been persisted yet.
    pub fn is_draft(&self) -> bool {
        !self.log_id.is_assigned()
    }

    /// One-line human-readable summary: `<severity> <message> (<association>)`.
    pub fn summary(&self) -> String {
        format!("{} {} ({})", self.severity, self.message, self.association)
    }
}
