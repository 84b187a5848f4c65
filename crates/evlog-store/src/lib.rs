//! Record storage for the event log bus.
//!
//! The publication layer never touches disk itself: it asks a
//! [`RecordStore`] to persist drafts, load records by [`LogId`], release
//! loaded records, delete records, and enumerate what already exists at
//! startup.
//!
//! # Storage Backends
//!
//! - [`InMemoryRecordStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileRecordStore`] -- one CRC-framed file per log in a directory
//!
//! # Design Rules
//!
//! 1. Records are immutable once written.
//! 2. The store, not the caller, assigns identifiers and timestamps.
//! 3. Identifier `0` is never assigned.
//! 4. All I/O errors are propagated, never silently ignored.
//!
//! [`LogId`]: evlog_types::LogId

pub mod alloc;
pub mod error;
pub mod file;
pub mod frame;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
