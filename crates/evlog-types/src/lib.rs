//! Foundation types for the event log bus.
//!
//! This crate provides the record, identifier, and naming types shared by
//! every other `evlog` crate.
//!
//! # Key Types
//!
//! - [`EventRecord`]: the full content of one event log
//! - [`LogId`]: 16-bit log identifier, `0` meaning "unassigned"
//! - [`ObjectPath`]: validated bus object path
//!
//! The [`names`] module holds the well-known service, interface, and
//! property names of the published object surface.

pub mod error;
pub mod names;
pub mod path;
pub mod record;
pub mod time;

pub use error::{TypeError, TypeResult};
pub use path::ObjectPath;
pub use record::{EventRecord, LogId};
pub use time::{format_timestamp, format_timestamp_in, TIME_FORMAT};
