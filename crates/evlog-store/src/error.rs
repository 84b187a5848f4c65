use std::path::PathBuf;

use evlog_types::LogId;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Every identifier in the 16-bit space is in use.
    #[error("no free log identifiers")]
    IdsExhausted,

    /// `create` was handed a record that already carries an identifier.
    #[error("record already has log id {0}")]
    AlreadyAssigned(LogId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored bytes for a log are malformed or fail their checksum.
    #[error("corrupt log {log_id}: {reason}")]
    Corrupt { log_id: LogId, reason: String },

    /// The storage directory exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
