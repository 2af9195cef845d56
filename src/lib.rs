//! uniqnum - random numbers that are never handed out twice
//!
//! Every value returned by the service is unique across the service's
//! lifetime. Issued values are persisted, so uniqueness survives restarts.
//!
//! # Quick Start
//!
//! ```ignore
//! use uniqnum::{UniqueNumberService, ValueKind};
//!
//! // Opens ./data, creating uniqnum.toml with defaults on first run
//! let service = UniqueNumberService::open("./data")?;
//!
//! let n = service.allocate(None)?;                      // integer in [100, 100000]
//! let body = serde_json::json!({ "number": n });        // {"number": 4821}
//! ```
//!
//! # Architecture
//!
//! - [`ValueSpace`] describes the domain and its cardinality
//! - [`Ledger`] records issued values (snapshot file, SQLite, memory)
//! - [`Allocator`] draws candidates and reserves them with bounded retries
//! - [`UniqueNumberService`] routes a kind selector to an allocator
//!
//! Request handlers map failures with [`Error::status_code`]: both
//! exhaustion kinds become 503, storage failures 500.

pub use uniqnum_core::{
    BoundarySignal, Error, Ledger, Result, Value, ValueKind, ValueSpace, MAX_DECIMAL_PRECISION,
    MAX_DECIMAL_UNITS, MAX_INTEGER_MAGNITUDE,
};
pub use uniqnum_engine::*;
pub use uniqnum_storage::{MemoryLedger, SnapshotLedger, SqliteLedger, DEFAULT_BUSY_TIMEOUT};
