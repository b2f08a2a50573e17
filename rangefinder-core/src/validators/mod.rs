//! Sample Ingestion Validators
//!
//! ## Overview
//!
//! Every value that enters a stateful component passes through a validator
//! first. Validation here is about physical plausibility of a single sample,
//! not about whether the sample agrees with history (that is the tracker's
//! outlier filter's job):
//!
//! ```text
//! raw sensor value
//!       │
//!       ▼
//! ┌──────────────┐   Err(InvalidSample) ──► logged at debug, dropped
//! │  validator   │
//! └──────┬───────┘
//!        │ Ok
//!        ▼
//! calibrator window / selector candidates
//! ```
//!
//! ## Validation Layers
//!
//! ### 1. Numeric sanity
//! NaN, infinities and non-positive distances never describe a real target.
//!
//! ### 2. Source band
//! Each source has a band where its physics holds. Short-range ground truth
//! beyond ~8 m is mostly multipath and must not train the calibrator.
//!
//! ### 3. Confidence
//! Reported confidence must lie in [0, 1]; a zero-confidence sample carries no
//! information and is dropped.
//!
//! ## Usage Example
//!
//! ```rust
//! use rangefinder_core::validators::{SampleValidator, CalibrationSampleValidator};
//! use rangefinder_core::calibration::CalibrationSample;
//!
//! let validator = CalibrationSampleValidator::default();
//! let sample = CalibrationSample::new(0.8, 3.2, 0.9, 1_000);
//! assert!(validator.validate(&sample).is_ok());
//!
//! let too_far = CalibrationSample::new(0.1, 14.0, 0.9, 1_000);
//! assert!(validator.validate(&too_far).is_err());
//! ```

mod calibration;
mod depth;
mod utils;

pub use calibration::CalibrationSampleValidator;
pub use depth::DepthReadingValidator;
pub use utils::{check_confidence, check_finite, check_positive, check_range};

use crate::errors::RangeResult;

/// Validates one kind of sample
pub trait SampleValidator {
    /// Sample type checked by this validator
    type Sample;

    /// Accept or reject a sample
    fn validate(&self, sample: &Self::Sample) -> RangeResult<()>;

    /// Convenience boolean form
    fn is_valid(&self, sample: &Self::Sample) -> bool {
        self.validate(sample).is_ok()
    }
}
