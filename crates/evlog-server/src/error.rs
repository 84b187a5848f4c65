use evlog_bus::BusError;
use evlog_protocol::MethodError;
use evlog_store::StoreError;
use evlog_types::{LogId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// No record or no published object exists for this log.
    #[error("log {0} not found")]
    NotFound(LogId),

    #[error("log {0} is already published")]
    AlreadyPublished(LogId),

    /// An inbound payload did not decode as the method's arguments.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The record was persisted but could not be made visible on the bus.
    #[error("log {log_id} was stored but could not be published: {source}")]
    Publish {
        log_id: LogId,
        #[source]
        source: Box<ServerError>,
    },

    #[error("{failed} of {total} logs could not be deleted")]
    ClearIncomplete { failed: usize, total: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("invalid name: {0}")]
    Type(#[from] TypeError),
}

impl ServerError {
    /// Returns `true` if the error ends the request loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bus(e) if e.is_fatal())
    }

    /// The error reply sent to a caller whose request failed with `self`.
    pub fn to_method_error(&self) -> MethodError {
        match self {
            Self::NotFound(_) => MethodError::file_not_found(self.to_string()),
            Self::InvalidArgs(_) => MethodError::invalid_args(self.to_string()),
            Self::Bus(BusError::Method(e)) => e.clone(),
            _ => MethodError::failed(self.to_string()),
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_protocol::error_names;

    #[test]
    fn reply_names_follow_error_class() {
        let err = ServerError::NotFound(LogId::new(4));
        assert_eq!(err.to_method_error().name, error_names::FILE_NOT_FOUND);
        assert!(err.to_method_error().is_not_found());

        let err = ServerError::InvalidArgs("expected s".into());
        assert_eq!(err.to_method_error().name, error_names::INVALID_ARGS);

        let err = ServerError::Store(StoreError::ReadOnly);
        assert_eq!(err.to_method_error().name, error_names::FAILED);
    }

    #[test]
    fn publish_error_names_persisted_id() {
        let err = ServerError::Publish {
            log_id: LogId::new(12),
            source: Box::new(ServerError::AlreadyPublished(LogId::new(12))),
        };
        assert!(err.to_string().contains("log 12 was stored"));
        assert!(err.to_method_error().message.contains("12"));
    }

    #[test]
    fn only_transport_loss_is_fatal() {
        assert!(ServerError::Bus(BusError::Disconnected).is_fatal());
        assert!(!ServerError::NotFound(LogId::new(1)).is_fatal());
        assert!(!ServerError::Bus(BusError::NotSubscribed).is_fatal());
    }
}
