//! Unique-value allocator
//!
//! Resolves one allocation request against a generator and a ledger:
//!
//! ```text
//! 1. ledger.count() >= space.cardinality()  -> Exhausted (no draw)
//! 2. up to max_attempts times:
//!      v = generator.next()
//!      ledger.try_reserve(v) == true        -> return v
//!      sleep(backoff) unless last attempt
//! 3.                                        -> RetriesExceeded
//! ```
//!
//! The allocator keeps no state of its own. Every call reads the ledger
//! fresh, so the exhaustion check sees allocations made by concurrent
//! requests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use uniqnum_core::{Error, Ledger, Result, Value, ValueSpace};

use crate::generator::CandidateGenerator;

/// Bounded retry policy for collisions
///
/// # Example
///
/// ```ignore
/// let policy = RetryPolicy::new()
///     .with_max_attempts(8)
///     .with_backoff(Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of candidates drawn per allocation
    pub max_attempts: u32,
    /// Pause between failed attempts (zero disables)
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Create a RetryPolicy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the pause between failed attempts
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Orchestrates candidate generation and ledger reservation
pub struct Allocator {
    generator: Arc<dyn CandidateGenerator>,
    ledger: Arc<dyn Ledger>,
    policy: RetryPolicy,
}

impl Allocator {
    /// Build an allocator over a generator and a ledger
    ///
    /// # Errors
    ///
    /// `InvalidSpace` if the generator and ledger describe different spaces.
    pub fn new(
        generator: Arc<dyn CandidateGenerator>,
        ledger: Arc<dyn Ledger>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        if generator.space() != ledger.space() {
            return Err(Error::InvalidSpace(format!(
                "generator draws from {} but ledger records {}",
                generator.space(),
                ledger.space()
            )));
        }
        Ok(Self {
            generator,
            ledger,
            policy,
        })
    }

    /// The space values are allocated from
    pub fn space(&self) -> &ValueSpace {
        self.generator.space()
    }

    /// The ledger backing this allocator
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// The retry policy used by [`Allocator::allocate`]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Allocate a value using the configured retry budget
    pub fn allocate(&self) -> Result<Value> {
        self.allocate_with(self.policy.max_attempts)
    }

    /// Allocate a value drawing at most `max_attempts` candidates
    ///
    /// # Errors
    ///
    /// - `Exhausted` if every value in the space has been issued
    /// - `RetriesExceeded` if `max_attempts` candidates all collided
    /// - `StorageUnavailable` if the ledger cannot be read or written
    pub fn allocate_with(&self, max_attempts: u32) -> Result<Value> {
        let space = self.space();
        let cardinality = space.cardinality();
        let issued = self.ledger.count()?;
        if issued as u128 >= cardinality {
            warn!(target: "uniqnum::alloc", space = %space, issued, "Value space exhausted");
            return Err(Error::Exhausted { cardinality });
        }

        for attempt in 1..=max_attempts {
            let candidate = self.generator.next();
            if self.ledger.try_reserve(&candidate)? {
                debug!(target: "uniqnum::alloc", value = %candidate, attempt, "Allocated");
                return Ok(candidate);
            }
            if attempt < max_attempts && !self.policy.backoff.is_zero() {
                thread::sleep(self.policy.backoff);
            }
        }

        warn!(
            target: "uniqnum::alloc",
            space = %space,
            issued,
            attempts = max_attempts,
            "Retry budget exhausted"
        );
        Err(Error::RetriesExceeded {
            attempts: max_attempts,
        })
    }
}
