use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::error::{GeneratorError, Result};
use crate::last::LastValue;
use crate::NumberGenerator;

/// Draws uniformly from a working-set window that slides through `[0, record_count)`.
///
/// After every `working_set` draws the window start advances by `churn_delta` keys, wrapping
/// around at `record_count`. Keys therefore age out of the hot set at a fixed request rate.
#[derive(Debug)]
pub struct ChurnGenerator {
    working_set: u64,
    churn_delta: u64,
    record_count: u64,
    draws: AtomicU64,
    last: LastValue,
}

impl ChurnGenerator {
    /// Creates a generator with a window of `working_set` keys over `record_count` keys.
    ///
    /// A working set larger than the record count is clamped to it.
    pub fn new(working_set: u64, churn_delta: u64, record_count: u64) -> Result<Self> {
        if record_count == 0 {
            return Err(GeneratorError::NotPositive("record count"));
        }
        if working_set == 0 {
            return Err(GeneratorError::NotPositive("working set"));
        }

        Ok(Self {
            working_set: working_set.min(record_count),
            churn_delta,
            record_count,
            draws: AtomicU64::new(0),
            last: LastValue::new(),
        })
    }

    /// The start of the window used by the next draw.
    pub fn window_start(&self) -> u64 {
        self.start_for(self.draws.load(Ordering::Relaxed))
    }

    /// The number of keys in the window.
    pub fn working_set(&self) -> u64 {
        self.working_set
    }

    fn start_for(&self, draw: u64) -> u64 {
        let epoch = u128::from(draw / self.working_set);
        (epoch * u128::from(self.churn_delta) % u128::from(self.record_count)) as u64
    }
}

impl NumberGenerator for ChurnGenerator {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        let offset = rng.random_range(0..self.working_set);
        let value = (self.start_for(draw) + offset) % self.record_count;
        self.last.store(value);
        value
    }

    fn last_number(&self) -> Option<u64> {
        self.last.load()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn draws_inside_window() {
        let generator = ChurnGenerator::new(10, 5, 100).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        for _ in 0..10 {
            let value = generator.next_number(&mut rng);
            assert!(value < 10, "{value}");
        }
        assert_eq!(generator.window_start(), 5);

        for _ in 0..10 {
            let value = generator.next_number(&mut rng);
            assert!((5..15).contains(&value), "{value}");
        }
    }

    #[test]
    fn window_wraps_around() {
        let generator = ChurnGenerator::new(4, 3, 10).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        // Epoch 3 starts at key 9 and wraps to keys 0..=2.
        for _ in 0..12 {
            generator.next_number(&mut rng);
        }
        assert_eq!(generator.window_start(), 9);
        for _ in 0..4 {
            let value = generator.next_number(&mut rng);
            assert!(value == 9 || value <= 2, "{value}");
        }
    }

    #[test]
    fn zero_delta_is_static() {
        let generator = ChurnGenerator::new(1000, 0, 50).unwrap();
        assert_eq!(generator.working_set(), 50);

        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..500 {
            assert!(generator.next_number(&mut rng) < 50);
        }
        assert_eq!(generator.window_start(), 0);
    }

    #[test]
    fn rejects_empty_key_space() {
        assert_eq!(
            ChurnGenerator::new(10, 1, 0).unwrap_err(),
            GeneratorError::NotPositive("record count")
        );
    }
}
