//! Error types for uniqnum
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for uniqnum operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the unique-value allocator
#[derive(Debug, Error)]
pub enum Error {
    /// The durable ledger cannot be read or written
    ///
    /// Never treated as an empty ledger.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Every value in the configured space has already been issued
    #[error("Value space exhausted: all {cardinality} values have been issued")]
    Exhausted {
        /// Cardinality of the exhausted space
        cardinality: u128,
    },

    /// Too many consecutive collisions within a single allocation
    #[error("No unused value found after {attempts} attempts")]
    RetriesExceeded {
        /// Number of candidates drawn before giving up
        attempts: u32,
    },

    /// Value space definition is malformed
    #[error("Invalid value space: {0}")]
    InvalidSpace(String),

    /// Value does not belong to the ledger's space
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Kind selector does not name a configured value space
    #[error("Unknown value kind: {0}")]
    UnknownKind(String),

    /// Configuration file could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),
}

/// What a request boundary should report for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySignal {
    /// The space is spent or collisions exhausted the retry budget
    NoMoreValues,
    /// Operational failure (storage, configuration)
    InternalFailure,
    /// The caller asked for something that does not exist
    BadRequest,
}

impl Error {
    /// Build a storage error from anything displayable
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::StorageUnavailable(msg.into())
    }

    /// True if the space is provably full
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::Exhausted { .. })
    }

    /// True if a later call may succeed without any external change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RetriesExceeded { .. })
    }

    /// Map the error onto the signal a request boundary should surface
    ///
    /// Both exhaustion kinds collapse to `NoMoreValues`; the distinction
    /// only matters for diagnostics.
    pub fn boundary_signal(&self) -> BoundarySignal {
        match self {
            Error::Exhausted { .. } | Error::RetriesExceeded { .. } => BoundarySignal::NoMoreValues,
            Error::UnknownKind(_) | Error::InvalidValue(_) => BoundarySignal::BadRequest,
            Error::StorageUnavailable(_) | Error::InvalidSpace(_) | Error::Config(_) => {
                BoundarySignal::InternalFailure
            }
        }
    }

    /// Conventional HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self.boundary_signal() {
            BoundarySignal::NoMoreValues => 503,
            BoundarySignal::InternalFailure => 500,
            BoundarySignal::BadRequest => 400,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::StorageUnavailable(format!("I/O error: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StorageUnavailable(format!("malformed ledger snapshot: {}", e))
    }
}
