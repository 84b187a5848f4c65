//! Event log daemon core.
//!
//! Publishes every stored event log as a bus object at
//! `<records-root>/<log_id>` and keeps that set in step with the store:
//!
//! - [`EventManager`] owns the bus endpoint, the store handle, the
//!   single-record [`RecordCache`], and the [`Registry`] of published logs.
//!   It ingests new logs (`acceptHostMessage`, `acceptTestMessage`), deletes
//!   one or all of them, and answers attribute reads.
//! - [`EventMonitor`] is the request loop: drain queued calls one at a
//!   time, block on the bus when idle, stop when the bus fails.
//! - [`EventServer`] wires both together from a [`ServerConfig`].
//!
//! Everything runs on one task; clients reach it only through bus calls.

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod registry;
pub mod server;

pub use cache::RecordCache;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use manager::{test_record, EventManager, JOURNAL_TARGET};
pub use monitor::{EventMonitor, LoopState};
pub use registry::{PublishedLogEntry, Registry, Target};
pub use server::EventServer;
