use rand::Rng;
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;

use crate::error::{GeneratorError, Result};

/// Collects `(weight, value)` pairs for a [`DiscreteGenerator`].
#[derive(Debug)]
pub struct DiscreteBuilder<T> {
    values: Vec<(f64, T)>,
}

impl<T> DiscreteBuilder<T> {
    /// Registers `value` with the given relative weight.
    pub fn add(mut self, weight: f64, value: T) -> Self {
        self.values.push((weight, value));
        self
    }

    /// Returns `true` if no value has been registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalizes the registered weights into a cumulative distribution.
    ///
    /// Fails if nothing was registered, if any weight is negative or not finite, or if all
    /// weights are zero.
    pub fn build(self) -> Result<DiscreteGenerator<T>> {
        if self.values.is_empty() {
            return Err(GeneratorError::Empty);
        }
        if let Some((weight, _)) = self
            .values
            .iter()
            .find(|(weight, _)| !weight.is_finite() || *weight < 0.0)
        {
            return Err(GeneratorError::InvalidWeight(*weight));
        }

        let total: f64 = self.values.iter().map(|(weight, _)| weight).sum();
        let index = WeightedIndex::new(self.values.iter().map(|(weight, _)| *weight))
            .map_err(|_| GeneratorError::InvalidWeight(total))?;

        Ok(DiscreteGenerator {
            values: self.values,
            total,
            index,
        })
    }
}

/// Draws labels with probability proportional to their registered weight.
///
/// Each draw picks a uniform real in `[0, total)` and returns the first value whose cumulative
/// weight exceeds it.
#[derive(Debug)]
pub struct DiscreteGenerator<T> {
    values: Vec<(f64, T)>,
    total: f64,
    index: WeightedIndex<f64>,
}

impl<T> DiscreteGenerator<T> {
    /// Starts registering values.
    pub fn builder() -> DiscreteBuilder<T> {
        DiscreteBuilder { values: Vec::new() }
    }

    /// Draws the next value.
    pub fn next_value<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.values[self.index.sample(rng)].1
    }

    /// The probability of drawing `value`.
    pub fn probability(&self, value: &T) -> f64
    where
        T: PartialEq,
    {
        let weight: f64 = self
            .values
            .iter()
            .filter(|(_, v)| v == value)
            .map(|(weight, _)| weight)
            .sum();
        weight / self.total
    }

    /// All registered values in registration order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn frequencies_converge_to_weights() {
        let generator = DiscreteGenerator::builder()
            .add(1.0, "a")
            .add(2.0, "b")
            .add(7.0, "c")
            .build()
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(7);

        let draws = 100_000;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(*generator.next_value(&mut rng)).or_default() += 1;
        }

        for (label, weight) in [("a", 0.1), ("b", 0.2), ("c", 0.7)] {
            let frequency = counts[label] as f64 / draws as f64;
            assert!(
                (frequency - weight).abs() < 0.01,
                "{label}: frequency {frequency} vs weight {weight}"
            );
            assert!((generator.probability(&label) - weight).abs() < 1e-9);
        }
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let generator = DiscreteGenerator::builder()
            .add(0.95, "get")
            .add(0.05, "set")
            .add(0.5, "delete")
            .build()
            .unwrap();

        assert!((generator.probability(&"delete") - 0.5 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_is_never_drawn() {
        let generator = DiscreteGenerator::builder()
            .add(0.0, "never")
            .add(1.0, "always")
            .build()
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        assert!((0..1000).all(|_| *generator.next_value(&mut rng) == "always"));
    }

    #[test]
    fn empty_fails_fast() {
        let result = DiscreteGenerator::<&str>::builder().build();
        assert_eq!(result.unwrap_err(), GeneratorError::Empty);
    }

    #[test]
    fn invalid_weights_fail_fast() {
        let negative = DiscreteGenerator::builder().add(-1.0, "x").build();
        assert_eq!(negative.unwrap_err(), GeneratorError::InvalidWeight(-1.0));

        let all_zero = DiscreteGenerator::builder().add(0.0, "x").build();
        assert_eq!(all_zero.unwrap_err(), GeneratorError::InvalidWeight(0.0));
    }
}
