use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object path {path:?}: {reason}")]
    InvalidObjectPath { path: String, reason: String },

    #[error("invalid log id: {0}")]
    InvalidLogId(String),
}

pub type TypeResult<T> = Result<T, TypeError>;
