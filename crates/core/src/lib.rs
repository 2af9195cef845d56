//! Core types and traits for uniqnum
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: an issued value, keyed by exact fixed-point units
//! - ValueSpace / ValueKind: bounded domains and their cardinality
//! - Error: Error type hierarchy and boundary mapping
//! - Traits: Ledger, the persistence abstraction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod space;
pub mod traits;
pub mod value;

pub use error::{BoundarySignal, Error, Result};
pub use space::{
    ValueKind, ValueSpace, MAX_DECIMAL_PRECISION, MAX_DECIMAL_UNITS, MAX_INTEGER_MAGNITUDE,
};
pub use traits::Ledger;
pub use value::Value;
