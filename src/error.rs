/*!
The error type shared by every fallible `fixburn` operation
*/
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for `fixburn` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors which can occur while setting up or persisting a forecast
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading or writing a file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed comma separated data
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON configuration
    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line of a text file could not be parsed
    #[error("parse error on line {line}: {reason}")]
    Parse {
        /// The 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },

    /// A vector or matrix did not have the expected shape
    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked
        what: String,
        /// The expected size
        expected: usize,
        /// The size found
        actual: usize,
    },

    /// Too few rows to fill a full window
    #[error("insufficient rows: need at least {expected}, got {actual}")]
    InsufficientRows {
        /// The window length
        expected: usize,
        /// The number of rows available
        actual: usize,
    },

    /// A feature is constant over the dataset and cannot be normalized
    #[error("feature {feature} has zero standard deviation")]
    ZeroDeviation {
        /// The index of the constant feature
        feature: usize,
    },

    /// A NaN or infinite value in the dataset
    #[error("non-finite value in row {row}, feature {feature}")]
    NonFinite {
        /// The 0-based row index
        row: usize,
        /// The index of the feature
        feature: usize,
    },

    /// No data rows at all
    #[error("dataset is empty")]
    EmptyDataset,

    /// A weight file does not hold exactly the expected number of bytes
    #[error("weight file {path:?} has {actual} bytes, expected {expected}")]
    WeightFileSize {
        /// The offending file
        path: PathBuf,
        /// The expected size in bytes
        expected: u64,
        /// The actual size in bytes
        actual: u64,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it
        reason: String,
    },
}

impl Error {
    /// Create a new dimension mismatch error
    pub fn dimension_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a new parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }
}
