use rand::Rng;
use rand::distr::{Distribution, Uniform};

use crate::error::{GeneratorError, Result};
use crate::last::LastValue;
use crate::NumberGenerator;

/// Draws integers uniformly from an inclusive range.
#[derive(Debug)]
pub struct UniformGenerator {
    distribution: Uniform<u64>,
    last: LastValue,
}

impl UniformGenerator {
    /// Creates a generator over `[lower, upper]`.
    pub fn new(lower: u64, upper: u64) -> Result<Self> {
        let distribution = Uniform::new_inclusive(lower, upper)
            .map_err(|_| GeneratorError::InvalidRange { lower, upper })?;

        Ok(Self {
            distribution,
            last: LastValue::new(),
        })
    }
}

impl NumberGenerator for UniformGenerator {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let value = self.distribution.sample(rng);
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
    fn stays_within_bounds() {
        let generator = UniformGenerator::new(3, 7).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        let mut seen = [false; 5];
        for _ in 0..1000 {
            let value = generator.next_number(&mut rng);
            assert!((3..=7).contains(&value));
            seen[(value - 3) as usize] = true;
        }

        assert!(seen.iter().all(|s| *s));
        assert!(generator.last_number().is_some());
    }

    #[test]
    fn single_value_range() {
        let generator = UniformGenerator::new(4, 4).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(generator.next_number(&mut rng), 4);
    }

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(
            UniformGenerator::new(5, 4).unwrap_err(),
            GeneratorError::InvalidRange { lower: 5, upper: 4 }
        );
    }
}
