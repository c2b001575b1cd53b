//! Error types for the clustering and projection engine.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engines, the vector adapter and the data loaders.
///
/// Shape problems are reported before any computation starts. Non-convergence
/// is never an error: it shows up as `iterations == max_iter` on the result.
#[derive(Debug, Error)]
pub enum Error {
    /// No points (or no features) were supplied.
    #[error("empty input provided")]
    EmptyInput,

    /// A vector had a different length than the first one.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimensionality of the first vector.
        expected: usize,
        /// Dimensionality of the offending vector.
        found: usize,
    },

    /// Requested cluster count was zero.
    #[error("invalid cluster count {requested}: at least one cluster is required")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
    },

    /// A tuning parameter is out of its valid range.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A record does not carry one of the named features.
    #[error("record {index} is missing feature '{feature}'")]
    MissingFeature {
        /// Position of the record in the input.
        index: usize,
        /// Feature name that was looked up.
        feature: String,
    },

    /// A record carries the feature but it is not a number.
    #[error("record {index} has a non-numeric value for feature '{feature}'")]
    NonNumericFeature {
        /// Position of the record in the input.
        index: usize,
        /// Feature name that was looked up.
        feature: String,
    },

    /// NaN or infinite value in a vector.
    #[error("vector {index} has a non-finite value at coordinate {coordinate}")]
    NonFiniteValue {
        /// Position of the vector in the input.
        index: usize,
        /// Coordinate within the vector.
        coordinate: usize,
    },

    /// Data cannot support the requested statistic.
    #[error("degenerate data: {0}")]
    DegenerateData(String),

    /// Reading input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing delimited input failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
