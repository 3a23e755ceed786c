use thiserror::Error;

/// Errors raised while constructing a generator.
#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    /// The lower bound of a range lies above its upper bound.
    #[error("invalid range: lower bound {lower} exceeds upper bound {upper}")]
    InvalidRange {
        /// Inclusive lower bound.
        lower: u64,
        /// Inclusive upper bound.
        upper: u64,
    },

    /// A discrete generator was built without any values.
    #[error("no values registered with the discrete generator")]
    Empty,

    /// A discrete weight is negative, NaN or infinite, or all weights are zero.
    #[error("invalid weight {0}")]
    InvalidWeight(f64),

    /// The Zipfian skew lies outside of the open interval `(0, 1)`.
    #[error("zipfian constant must lie strictly between 0 and 1, got {0}")]
    InvalidConstant(f64),

    /// A size parameter that has to be positive is zero.
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Result type for generator construction.
pub type Result<T, E = GeneratorError> = std::result::Result<T, E>;
