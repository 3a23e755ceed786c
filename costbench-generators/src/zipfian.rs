//! Zipfian sampling after Gray et al., "Quickly Generating Billion-Record Synthetic Databases".
//!
//! The normalization constant `zeta(n, theta)` is computed once at construction. When a caller
//! asks for a larger item count, the sum is extended from the previous count instead of being
//! recomputed, so growing key spaces cost `O(new items)` once rather than `O(n)` per draw.

use std::sync::{PoisonError, RwLock};

use rand::Rng;

use crate::error::{GeneratorError, Result};
use crate::last::LastValue;
use crate::NumberGenerator;

/// The default skew.
pub const ZIPFIAN_CONSTANT: f64 = 0.99;

/// Draws integers from `[min, max]` with a Zipfian popularity: `min` is the most popular item,
/// `min + 1` the second most popular, and so on.
#[derive(Debug)]
pub struct ZipfianGenerator {
    base: u64,
    items: u64,
    theta: f64,
    alpha: f64,
    zeta2theta: f64,
    state: RwLock<ZetaState>,
    last: LastValue,
}

#[derive(Clone, Copy, Debug)]
struct ZetaState {
    /// The item count `zetan` was computed for.
    count: u64,
    zetan: f64,
    eta: f64,
}

impl ZipfianGenerator {
    /// Creates a generator over `[min, max]` using [`ZIPFIAN_CONSTANT`].
    pub fn new(min: u64, max: u64) -> Result<Self> {
        Self::with_constant(min, max, ZIPFIAN_CONSTANT)
    }

    /// Creates a generator over `[min, max]` with skew `theta`.
    pub fn with_constant(min: u64, max: u64, theta: f64) -> Result<Self> {
        let items = item_count(min, max)?;
        check_constant(theta)?;
        Self::with_zetan(min, max, theta, zeta(0, items, theta, 0.0))
    }

    /// Creates a generator with a precomputed `zeta(max - min + 1, theta)`.
    ///
    /// This skips the harmonic sum entirely, which matters for very large item counts.
    pub fn with_zetan(min: u64, max: u64, theta: f64, zetan: f64) -> Result<Self> {
        let items = item_count(min, max)?;
        check_constant(theta)?;

        let zeta2theta = zeta(0, 2, theta, 0.0);
        let state = ZetaState {
            count: items,
            zetan,
            eta: eta(items, theta, zeta2theta, zetan),
        };

        Ok(Self {
            base: min,
            items,
            theta,
            alpha: 1.0 / (1.0 - theta),
            zeta2theta,
            state: RwLock::new(state),
            last: LastValue::new(),
        })
    }

    /// The number of items this generator was constructed with.
    pub fn items(&self) -> u64 {
        self.items
    }

    /// The normalization constant for the largest item count seen so far.
    pub fn zetan(&self) -> f64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).zetan
    }

    /// Draws a value from `[min, min + item_count)`.
    ///
    /// If `item_count` exceeds every count seen before, the normalization constant is extended
    /// incrementally. Smaller counts reuse the cached constant and clamp the result.
    pub fn next_bounded<R: Rng + ?Sized>(&self, rng: &mut R, item_count: u64) -> u64 {
        let state = self.state_for(item_count);

        let u: f64 = rng.random();
        let uz = u * state.zetan;

        let rank = if uz < 1.0 {
            0
        } else if uz < 1.0 + 0.5f64.powf(self.theta) {
            1
        } else {
            (item_count as f64 * (state.eta * u - state.eta + 1.0).powf(self.alpha)) as u64
        };

        let value = self.base + rank.min(item_count.saturating_sub(1));
        self.last.store(value);
        value
    }

    fn state_for(&self, item_count: u64) -> ZetaState {
        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        if item_count <= state.count {
            return state;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have grown the sum while we waited for the lock.
        if item_count > state.count {
            state.zetan = zeta(state.count, item_count, self.theta, state.zetan);
            state.eta = eta(item_count, self.theta, self.zeta2theta, state.zetan);
            state.count = item_count;
        }
        *state
    }
}

impl NumberGenerator for ZipfianGenerator {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.next_bounded(rng, self.items)
    }

    fn last_number(&self) -> Option<u64> {
        self.last.load()
    }
}

fn item_count(min: u64, max: u64) -> Result<u64> {
    if min > max {
        return Err(GeneratorError::InvalidRange {
            lower: min,
            upper: max,
        });
    }
    Ok(max - min + 1)
}

fn check_constant(theta: f64) -> Result<()> {
    if theta > 0.0 && theta < 1.0 {
        Ok(())
    } else {
        Err(GeneratorError::InvalidConstant(theta))
    }
}

/// Extends `initial = zeta(start, theta)` to `zeta(n, theta)`.
pub(crate) fn zeta(start: u64, n: u64, theta: f64, initial: f64) -> f64 {
    (start..n).fold(initial, |sum, i| sum + 1.0 / ((i + 1) as f64).powf(theta))
}

fn eta(items: u64, theta: f64, zeta2theta: f64, zetan: f64) -> f64 {
    // With two items or fewer every draw is answered by the first two branches.
    if items <= 2 {
        return 0.0;
    }
    (1.0 - (2.0 / items as f64).powf(1.0 - theta)) / (1.0 - zeta2theta / zetan)
}
