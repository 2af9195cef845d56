//! Storage layer for uniqnum
//!
//! This crate implements the `Ledger` persistence strategies:
//! - SnapshotLedger: whole issued set in one JSON file, rewritten atomically
//!   under a per-handle mutex and an exclusive file lock
//! - SqliteLedger: one row per value, uniqueness enforced by a `UNIQUE`
//!   constraint; safe for concurrent writers without external locking
//! - MemoryLedger: non-durable `HashSet` for ephemeral use

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod snapshot;
pub mod sqlite;

pub use memory::MemoryLedger;
pub use snapshot::SnapshotLedger;
pub use sqlite::{SqliteLedger, DEFAULT_BUSY_TIMEOUT};
