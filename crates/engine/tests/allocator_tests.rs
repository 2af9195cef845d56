//! Allocator behaviour against durable ledgers
//!
//! Covers uniqueness, exhaustion and the retry bound end to end, with the
//! snapshot and SQLite strategies underneath.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uniqnum_core::{Error, Ledger, Value, ValueSpace};
use uniqnum_engine::{Allocator, RandomGenerator, RetryPolicy};
use uniqnum_storage::{MemoryLedger, SnapshotLedger, SqliteLedger};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_backoff(Duration::ZERO)
}

fn build(ledger: Arc<dyn Ledger>, seed: u64, max_attempts: u32) -> Allocator {
    let generator = Arc::new(RandomGenerator::seeded(*ledger.space(), seed));
    Allocator::new(generator, ledger, policy(max_attempts)).unwrap()
}

#[test]
fn test_five_value_space_on_snapshot_ledger() {
    let dir = TempDir::new().unwrap();
    let space = ValueSpace::integer(100, 104).unwrap();
    let ledger = Arc::new(SnapshotLedger::open(dir.path().join("used_numbers.json"), space).unwrap());
    let allocator = build(ledger, 5, 10_000);

    let values: HashSet<Value> = (0..5).map(|_| allocator.allocate().unwrap()).collect();
    assert_eq!(values, (100..=104).map(Value::Integer).collect::<HashSet<_>>());
    assert!(matches!(
        allocator.allocate(),
        Err(Error::Exhausted { cardinality: 5 })
    ));
}

#[test]
fn test_five_value_space_on_sqlite_ledger() {
    let dir = TempDir::new().unwrap();
    let space = ValueSpace::integer(100, 104).unwrap();
    let ledger = Arc::new(SqliteLedger::open(dir.path().join("random_numbers.db"), space).unwrap());
    let allocator = build(ledger, 5, 10_000);

    let values: HashSet<Value> = (0..5).map(|_| allocator.allocate().unwrap()).collect();
    assert_eq!(values, (100..=104).map(Value::Integer).collect::<HashSet<_>>());
    assert!(allocator.allocate().unwrap_err().is_exhausted());
}

#[test]
fn test_decimal_space_exhaustion() {
    let space = ValueSpace::decimal(0.0, 0.5, 1).unwrap();
    let allocator = build(Arc::new(MemoryLedger::new(space)), 3, 10_000);

    let values: Vec<String> = {
        let mut v: Vec<Value> = (0..5).map(|_| allocator.allocate().unwrap()).collect();
        v.sort();
        v.iter().map(|v| v.to_string()).collect()
    };
    assert_eq!(values, ["0.0", "0.1", "0.2", "0.3", "0.4"]);
    assert!(allocator.allocate().unwrap_err().is_exhausted());
}

#[test]
fn test_allocation_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("used_numbers.json");
    let space = ValueSpace::integer(0, 19).unwrap();

    let first: HashSet<Value> = {
        let ledger = Arc::new(SnapshotLedger::open(&path, space).unwrap());
        let allocator = build(ledger, 1, 10_000);
        (0..10).map(|_| allocator.allocate().unwrap()).collect()
    };

    // Same seed: the generator replays its draws, the ledger must reject them
    let ledger = Arc::new(SnapshotLedger::open(&path, space).unwrap());
    let allocator = build(ledger.clone(), 1, 10_000);
    let second: HashSet<Value> = (0..10).map(|_| allocator.allocate().unwrap()).collect();

    assert!(first.is_disjoint(&second));
    assert_eq!(ledger.count().unwrap(), 20);
    assert!(allocator.allocate().unwrap_err().is_exhausted());
}

#[test]
fn test_storage_failure_propagates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("used_numbers.json");
    let space = ValueSpace::integer(0, 99).unwrap();
    let ledger = Arc::new(SnapshotLedger::open(&path, space).unwrap());
    let allocator = build(ledger, 2, 5);

    allocator.allocate().unwrap();
    std::fs::write(&path, "{\"broken\": true}").unwrap();

    let err = allocator.allocate().unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));
    assert_eq!(err.status_code(), 500);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Successful allocations never repeat; every failure is a
    /// "no more values" kind.
    #[test]
    fn allocations_are_unique(size in 1i64..40, calls in 1usize..60, seed in any::<u64>(), attempts in 1u32..20) {
        let space = ValueSpace::integer(0, size - 1).unwrap();
        let ledger = Arc::new(MemoryLedger::new(space));
        let allocator = build(ledger.clone(), seed, attempts);

        let mut seen = HashSet::new();
        for _ in 0..calls {
            match allocator.allocate() {
                Ok(v) => {
                    prop_assert!(space.contains(&v));
                    prop_assert!(seen.insert(v));
                }
                Err(e) => prop_assert!(e.is_exhausted() || e.is_retryable()),
            }
        }
        prop_assert_eq!(ledger.count().unwrap(), seen.len() as u64);
        if seen.len() as i64 == size {
            prop_assert!(allocator.allocate().unwrap_err().is_exhausted());
        }
    }
}
