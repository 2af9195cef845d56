//! In-memory ledger for ephemeral services and tests
//!
//! Not durable: the issued set is lost when the ledger is dropped.

use parking_lot::Mutex;
use std::collections::HashSet;
use uniqnum_core::{Ledger, Result, Value, ValueSpace};

/// Ledger holding the issued set in a mutex-guarded `HashSet`
#[derive(Debug)]
pub struct MemoryLedger {
    space: ValueSpace,
    issued: Mutex<HashSet<Value>>,
}

impl MemoryLedger {
    /// Create an empty ledger for `space`
    pub fn new(space: ValueSpace) -> Self {
        Self {
            space,
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Create a ledger pre-populated with `values`
    ///
    /// Values outside `space` are rejected.
    pub fn with_values(space: ValueSpace, values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut issued = HashSet::new();
        for value in values {
            space.check(&value)?;
            issued.insert(value);
        }
        Ok(Self {
            space,
            issued: Mutex::new(issued),
        })
    }
}

impl Ledger for MemoryLedger {
    fn space(&self) -> &ValueSpace {
        &self.space
    }

    fn load(&self) -> Result<HashSet<Value>> {
        Ok(self.issued.lock().clone())
    }

    fn try_reserve(&self, value: &Value) -> Result<bool> {
        self.space.check(value)?;
        Ok(self.issued.lock().insert(*value))
    }

    fn count(&self) -> Result<u64> {
        Ok(self.issued.lock().len() as u64)
    }
}
