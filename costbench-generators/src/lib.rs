//! Stateful samplers that drive a synthetic key/value workload.
//!
//! Every generator in this crate is constructed once and then shared between worker threads.
//! Generators never own a random number generator. Instead, each draw borrows the caller's RNG,
//! which lets every worker carry its own seeded [`SmallRng`](rand::rngs::SmallRng) while the
//! generator state itself lives behind atomics or short locks.
//!
//! The integer generators implement [`NumberGenerator`]:
//!
//! - [`UniformGenerator`]: uniform over an inclusive range.
//! - [`ZipfianGenerator`]: Zipfian over an inclusive range, with support for a growing item count.
//! - [`ScrambledZipfianGenerator`]: Zipfian popularity spread over the key space by [`fnv_hash64`].
//! - [`SkewedLatestGenerator`]: Zipfian offsets below the most recently acknowledged insert.
//! - [`ChurnGenerator`]: uniform within a sliding working-set window.
//!
//! Labels (operation kinds, cost tiers) are drawn from a [`DiscreteGenerator`], and insert
//! sequences are handed out by a [`CounterGenerator`] or an [`AcknowledgedCounter`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod churn;
mod counter;
mod discrete;
mod error;
mod hash;
mod last;
mod latest;
mod scrambled;
mod uniform;
mod zipfian;

use rand::Rng;

pub use churn::ChurnGenerator;
pub use counter::{AcknowledgedCounter, CounterGenerator};
pub use discrete::{DiscreteBuilder, DiscreteGenerator};
pub use error::{GeneratorError, Result};
pub use hash::fnv_hash64;
pub use latest::SkewedLatestGenerator;
pub use scrambled::ScrambledZipfianGenerator;
pub use uniform::UniformGenerator;
pub use zipfian::{ZIPFIAN_CONSTANT, ZipfianGenerator};

/// A generator of integers that can be shared between threads.
pub trait NumberGenerator: Send + Sync {
    /// Draws the next value using the caller's random number generator.
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64;

    /// Returns the value produced by the most recent draw, if any.
    fn last_number(&self) -> Option<u64>;
}
