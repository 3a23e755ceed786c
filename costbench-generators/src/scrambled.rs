use rand::Rng;

use crate::error::{GeneratorError, Result};
use crate::hash::fnv_hash64;
use crate::last::LastValue;
use crate::zipfian::{ZIPFIAN_CONSTANT, ZipfianGenerator};
use crate::NumberGenerator;

/// Number of ranks of the underlying Zipfian distribution for the default constant.
const ITEM_COUNT: u64 = 10_000_000_000;

/// `zeta(ITEM_COUNT, ZIPFIAN_CONSTANT)`, precomputed.
const ZETAN: f64 = 26.469_028_201_783_02;

/// A Zipfian generator whose popular items are scattered across the key space.
///
/// Ranks are drawn from a Zipfian distribution and then mapped to key ids through
/// [`fnv_hash64`], so the hottest keys are not clustered at the lowest ids. Construct it over
/// the *eventual* key space (existing records plus the inserts expected during the run) and
/// reject ids that have not been inserted yet: the rank-to-key mapping then never changes while
/// the key space grows.
#[derive(Debug)]
pub struct ScrambledZipfianGenerator {
    min: u64,
    item_count: u64,
    ranks: ZipfianGenerator,
    last: LastValue,
}

impl ScrambledZipfianGenerator {
    /// Creates a generator over `[min, max]` using [`ZIPFIAN_CONSTANT`].
    pub fn new(min: u64, max: u64) -> Result<Self> {
        Self::with_constant(min, max, ZIPFIAN_CONSTANT)
    }

    /// Creates a generator over `[min, max]` with skew `theta`.
    ///
    /// For the default constant, ranks come from a fixed space of ten billion items with a
    /// precomputed normalization constant. Any other constant computes it once over the
    /// requested item count.
    pub fn with_constant(min: u64, max: u64, theta: f64) -> Result<Self> {
        if min > max {
            return Err(GeneratorError::InvalidRange {
                lower: min,
                upper: max,
            });
        }
        let item_count = max - min + 1;

        let ranks = if theta == ZIPFIAN_CONSTANT {
            ZipfianGenerator::with_zetan(0, ITEM_COUNT - 1, theta, ZETAN)?
        } else {
            ZipfianGenerator::with_constant(0, item_count - 1, theta)?
        };

        Ok(Self {
            min,
            item_count,
            ranks,
            last: LastValue::new(),
        })
    }

    /// The number of key ids this generator spreads ranks over.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Maps a popularity rank (0 is the most popular) to its key id.
    pub fn key_for_rank(&self, rank: u64) -> u64 {
        self.min + fnv_hash64(rank) % self.item_count
    }
}

impl NumberGenerator for ScrambledZipfianGenerator {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let value = self.key_for_rank(self.ranks.next_number(rng));
        self.last.store(value);
        value
    }

    fn last_number(&self) -> Option<u64> {
        self.last.load()
    }
}
