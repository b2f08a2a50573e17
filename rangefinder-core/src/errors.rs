//! Error Types for the Ranging Core
//!
//! ## Design Philosophy
//!
//! Almost nothing in the per-frame path is allowed to fail loudly. A missing depth
//! map, a ray that never meets terrain or a reading that looks like an outlier are
//! all normal operating conditions, and each component absorbs them locally:
//!
//! | Condition               | Where it is absorbed          | What the caller sees     |
//! |-------------------------|-------------------------------|--------------------------|
//! | Sensor unavailable      | pipeline input gathering      | source absent            |
//! | Invalid sample          | `validators`, calibrator      | sample discarded         |
//! | Calibration fit rejected| `calibration`                 | previous fit retained    |
//! | No qualifying source    | `fusion::selector`            | `SemanticDecision::None` |
//! | Ray miss                | `terrain::raycast`            | `None`                   |
//! | Outlier                 | `fusion::outlier`             | median substituted       |
//!
//! `RangeError` therefore only crosses a module boundary for configuration
//! loading, elevation tile parsing and ingestion results that the caller is
//! expected to log and drop.
//!
//! Errors carry `&'static str` reasons where possible so they stay `Copy`-cheap
//! to build in hot paths; only I/O and configuration errors own a `String`.
//!
//! ## Example
//!
//! ```rust
//! use rangefinder_core::errors::RangeError;
//! use rangefinder_core::validators::{SampleValidator, CalibrationSampleValidator};
//!
//! let validator = CalibrationSampleValidator::default();
//! match validator.check_ground_truth(f64::NAN) {
//!     Err(RangeError::InvalidSample { .. }) => {} // dropped at ingestion
//!     _ => unreachable!(),
//! }
//! ```

use thiserror::Error;

/// Result type for ranging operations
pub type RangeResult<T> = Result<T, RangeError>;

/// Errors produced by the ranging core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    /// Reading is NaN, non-positive or outside the physical range of its source
    #[error("Invalid sample {value}: {reason}")]
    InvalidSample {
        /// Offending value
        value: f64,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Not enough samples to perform the requested operation
    #[error("Insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Minimum number of samples needed
        required: usize,
        /// Samples currently available
        available: usize,
    },

    /// Regression produced parameters outside plausibility bounds
    #[error("Calibration fit rejected: {reason}")]
    FitRejected {
        /// Which bound was violated
        reason: &'static str,
    },

    /// Configuration failed to parse or validate
    #[error("Configuration error: {0}")]
    Config(String),

    /// Elevation tile could not be decoded
    #[error("Tile error: {0}")]
    Tile(String),

    /// Underlying I/O failure (config or manifest files)
    #[error("I/O error: {0}")]
    Io(String),
}

impl RangeError {
    /// Shorthand for an invalid sample
    pub fn invalid(value: f64, reason: &'static str) -> Self {
        Self::InvalidSample { value, reason }
    }

    /// True for errors that are part of normal operation and only worth a debug log
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidSample { .. } | Self::InsufficientData { .. }
        )
    }
}

impl From<std::io::Error> for RangeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
