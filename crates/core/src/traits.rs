//! Core traits for ledger abstraction
//!
//! This module defines the Ledger trait that lets the allocator run on top
//! of different persistence strategies without knowing which one it has.

use std::collections::HashSet;

use crate::error::Result;
use crate::space::ValueSpace;
use crate::value::Value;

/// Durable record of every value already issued from one value space
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
///
/// Implementations read durable state on every call. Nothing is cached
/// between calls, so a fresh process sees exactly what the previous one
/// persisted.
pub trait Ledger: Send + Sync {
    /// The space this ledger records values for
    fn space(&self) -> &ValueSpace;

    /// Load the full issued set
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the backing store exists but cannot be read
    /// or decoded. An unreadable store is never reported as empty.
    fn load(&self) -> Result<HashSet<Value>>;

    /// Atomically record `value` if it has not been issued yet
    ///
    /// Returns `Ok(true)` once the value is durably recorded, `Ok(false)`
    /// without touching state if it was already present.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if `value` is outside the ledger's space,
    /// `StorageUnavailable` on any storage failure. On error nothing has
    /// been recorded.
    fn try_reserve(&self, value: &Value) -> Result<bool>;

    /// Number of issued values inside the ledger's space
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the backing store cannot be read.
    fn count(&self) -> Result<u64>;
}
