//! Message bus endpoint for the event log daemon.
//!
//! A [`Bus`] is owned by one task. It keeps a table of objects (each a path
//! with one or more named interfaces), queues method calls from clients, and
//! broadcasts lifecycle signals. The owner pulls resolved calls with
//! [`Bus::process`] and answers them through the attached responder; calls
//! addressed to unknown objects, interfaces, or names never reach it.
//!
//! Clients talk to the bus through the [`BusCaller`] trait, implemented by
//! [`BusClient`] (same process) and [`RemoteClient`] (over the Unix socket
//! served by [`SocketListener`]).
//!
//! Registrations are scoped: [`Bus::add_object`] returns a [`Slot`], and the
//! interface disappears from the bus when the slot is dropped.

pub mod bus;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod remote;
pub mod table;
pub mod values;

pub use bus::{Bus, BusConfig, BusConnector};
pub use client::{BusCaller, BusClient};
pub use dispatch::{CallResult, Dispatch, ManagedObject, Request, Responder};
pub use error::{BusError, BusResult};
pub use listener::SocketListener;
pub use remote::RemoteClient;
pub use table::Slot;
