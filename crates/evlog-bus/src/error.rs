use evlog_protocol::{MethodError, ProtocolError};
use evlog_types::{ObjectPath, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// An interface is already registered at this path.
    #[error("interface {interface} already registered at {path}")]
    ObjectExists { path: ObjectPath, interface: String },

    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// The remote side answered with an error reply.
    #[error("method failed: {0}")]
    Method(MethodError),

    /// Every connection to the bus endpoint is gone.
    #[error("bus disconnected")]
    Disconnected,

    #[error("not subscribed to signals")]
    NotSubscribed,

    #[error("signal subscriber lagged behind by {0} signals")]
    Lagged(u64),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Returns `true` if this error is fatal for the bus endpoint itself
    /// rather than for a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Io(_))
    }
}

pub type BusResult<T> = Result<T, BusError>;
