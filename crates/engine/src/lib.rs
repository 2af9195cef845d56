//! Allocation engine for uniqnum
//!
//! This crate orchestrates the lower layers:
//! - Generator: uniform candidate draws from a value space
//! - Allocator: exhaustion check, bounded retries, reservation
//! - Service: kind selector routing, config loading, ledger opening
//!
//! The engine is the only component that knows about:
//! - Retry policy and backoff
//! - Which storage strategy backs which value kind

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod generator;
pub mod service;

pub use allocator::{Allocator, RetryPolicy};
pub use generator::{CandidateGenerator, RandomGenerator};
pub use service::{
    DecimalRangeConfig, IntegerRangeConfig, ServiceConfig, StorageStrategy, UniqueNumberService,
};
