//! Wire protocol for the event log bus.
//!
//! Defines the message types exchanged between bus clients and the daemon
//! (method calls, replies, error replies, lifecycle signals) and the framing
//! used to carry them over a byte stream.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::EvlogCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    error_names, BusMessage, InterfaceMap, MethodCall, MethodError, PropertyMap, Signal, Value,
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
