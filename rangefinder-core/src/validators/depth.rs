//! Per-source depth reading validator
//!
//! Applies each source's physical band before a reading is offered to the
//! selector. Readings outside the band are not "low confidence", they are
//! wrong, so they are rejected rather than down-weighted.

use crate::{
    errors::{RangeError, RangeResult},
    types::{DepthReading, SourceTag},
};

use super::{utils, SampleValidator};

/// Validator for selector candidates
#[derive(Debug, Clone)]
pub struct DepthReadingValidator {
    /// Neural hard cap (m)
    neural_max_m: f64,
    /// Terrain search limit (m)
    terrain_max_m: f64,
}

impl DepthReadingValidator {
    /// Validator with the configured neural cap and terrain search limit
    pub fn new(neural_max_m: f64, terrain_max_m: f64) -> Self {
        Self {
            neural_max_m,
            terrain_max_m,
        }
    }

    /// Physical band `(min, max)` for a source (m)
    pub fn band(&self, source: SourceTag) -> (f64, f64) {
        match source {
            SourceTag::Manual => (1.0, 3000.0),
            SourceTag::ShortRange => (0.1, 12.0),
            SourceTag::ObjectSize => (1.0, 3000.0),
            SourceTag::Terrain => (1.0, self.terrain_max_m),
            SourceTag::Neural => (0.1, self.neural_max_m),
            SourceTag::Geometric => (5.0, 800.0),
        }
    }
}

impl SampleValidator for DepthReadingValidator {
    type Sample = DepthReading;

    fn validate(&self, reading: &DepthReading) -> RangeResult<()> {
        utils::check_positive(reading.distance_m)?;
        utils::check_confidence(reading.confidence)?;
        if reading.confidence <= 0.0 {
            return Err(RangeError::invalid(reading.distance_m, "zero confidence"));
        }
        let (min, max) = self.band(reading.source);
        utils::check_range(reading.distance_m, min, max)
    }
}
