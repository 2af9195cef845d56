//! Candidate generation
//!
//! A generator draws one value uniformly from its space per call. Draws are
//! made over the space's integer unit range, so decimal candidates come out
//! already rounded to the configured precision.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uniqnum_core::{Value, ValueSpace};

/// Source of candidate values for an allocator
///
/// Implementations must be shareable across request threads.
pub trait CandidateGenerator: Send + Sync {
    /// The space candidates are drawn from
    fn space(&self) -> &ValueSpace;

    /// Draw one candidate
    fn next(&self) -> Value;
}

/// Uniform pseudo-random generator (not cryptographically strong)
pub struct RandomGenerator {
    space: ValueSpace,
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    /// Generator seeded from OS entropy
    pub fn new(space: ValueSpace) -> Self {
        Self::with_rng(space, StdRng::from_entropy())
    }

    /// Deterministic generator, for tests and reproducible runs
    pub fn seeded(space: ValueSpace, seed: u64) -> Self {
        Self::with_rng(space, StdRng::seed_from_u64(seed))
    }

    fn with_rng(space: ValueSpace, rng: StdRng) -> Self {
        Self {
            space,
            rng: Mutex::new(rng),
        }
    }
}

impl CandidateGenerator for RandomGenerator {
    fn space(&self) -> &ValueSpace {
        &self.space
    }

    fn next(&self) -> Value {
        let (lower, upper) = self.space.unit_bounds();
        let units = self.rng.lock().gen_range(lower..=upper);
        self.space.value_from_units(units)
    }
}
