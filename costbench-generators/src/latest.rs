use std::sync::Arc;

use rand::Rng;

use crate::counter::AcknowledgedCounter;
use crate::error::Result;
use crate::last::LastValue;
use crate::zipfian::ZipfianGenerator;
use crate::NumberGenerator;

/// Skews draws toward the most recently inserted key.
///
/// Each draw samples a Zipfian offset and subtracts it from the highest acknowledged id of the
/// `basis` counter, so recency correlates with popularity.
#[derive(Debug)]
pub struct SkewedLatestGenerator {
    basis: Arc<AcknowledgedCounter>,
    offsets: ZipfianGenerator,
    last: LastValue,
}

impl SkewedLatestGenerator {
    /// Creates a generator that follows the acknowledged ids of `basis`.
    pub fn new(basis: Arc<AcknowledgedCounter>) -> Result<Self> {
        let items = basis.last().unwrap_or(0) + 1;
        let offsets = ZipfianGenerator::new(0, items - 1)?;

        Ok(Self {
            basis,
            offsets,
            last: LastValue::new(),
        })
    }
}

impl NumberGenerator for SkewedLatestGenerator {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let max = self.basis.last().unwrap_or(0);
        let value = max - self.offsets.next_bounded(rng, max + 1);
        self.last.store(value);
        value
    }

    fn last_number(&self) -> Option<u64> {
        self.last.load()
    }
}
