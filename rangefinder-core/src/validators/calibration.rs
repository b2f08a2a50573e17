//! Calibration sample validator
//!
//! Rejects pairs that would poison the regression:
//! - ground truth outside the short-range sensor's trustworthy band
//! - non-positive or non-finite raw neural output (the inverse family divides by it)
//! - zero or out-of-range confidence

use crate::{
    calibration::CalibrationSample,
    config::CalibrationConfig,
    errors::{RangeError, RangeResult},
};

use super::{utils, SampleValidator};

/// Validator for (raw neural, ground truth) pairs
#[derive(Debug, Clone)]
pub struct CalibrationSampleValidator {
    /// Nearest accepted ground truth (m)
    min_ground_truth_m: f64,
    /// Farthest accepted ground truth (m)
    max_ground_truth_m: f64,
}

impl Default for CalibrationSampleValidator {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

impl CalibrationSampleValidator {
    /// Validator for an explicit ground-truth band
    pub fn with_band(min_m: f64, max_m: f64) -> Self {
        let (min_m, max_m) = if min_m > max_m { (max_m, min_m) } else { (min_m, max_m) };
        Self {
            min_ground_truth_m: min_m.max(0.0),
            max_ground_truth_m: max_m,
        }
    }

    /// Validator matching a calibration configuration
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::with_band(config.ground_truth_min_m, config.ground_truth_max_m)
    }

    /// Check only the ground-truth distance
    pub fn check_ground_truth(&self, meters: f64) -> RangeResult<()> {
        utils::check_positive(meters)?;
        utils::check_range(meters, self.min_ground_truth_m, self.max_ground_truth_m)
    }

    /// Check only the raw neural value
    pub fn check_raw(&self, raw: f64) -> RangeResult<()> {
        utils::check_positive(raw)
    }

    /// Accepted ground-truth band `(min, max)`
    pub fn band(&self) -> (f64, f64) {
        (self.min_ground_truth_m, self.max_ground_truth_m)
    }
}

impl SampleValidator for CalibrationSampleValidator {
    type Sample = CalibrationSample;

    fn validate(&self, sample: &CalibrationSample) -> RangeResult<()> {
        self.check_raw(sample.raw_neural)?;
        self.check_ground_truth(sample.ground_truth_m)?;
        utils::check_confidence(sample.confidence)?;
        if sample.confidence <= 0.0 {
            return Err(RangeError::invalid(0.0, "zero confidence"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        let v = CalibrationSampleValidator::default();
        assert!(v.check_ground_truth(0.3).is_ok());
        assert!(v.check_ground_truth(8.0).is_ok());
        assert!(v.check_ground_truth(0.29).is_err());
        assert!(v.check_ground_truth(8.01).is_err());
    }

    #[test]
    fn rejects_bad_pairs() {
        let v = CalibrationSampleValidator::default();
        assert!(v.validate(&CalibrationSample::new(0.0, 2.0, 0.9, 0)).is_err());
        assert!(v.validate(&CalibrationSample::new(f64::NAN, 2.0, 0.9, 0)).is_err());
        assert!(v.validate(&CalibrationSample::new(0.5, 2.0, 0.0, 0)).is_err());
        assert!(v.validate(&CalibrationSample::new(0.5, 2.0, 0.7, 0)).is_ok());
    }

    #[test]
    fn swapped_band_is_normalised() {
        let v = CalibrationSampleValidator::with_band(8.0, 0.3);
        assert_eq!(v.band(), (0.3, 8.0));
    }
}
