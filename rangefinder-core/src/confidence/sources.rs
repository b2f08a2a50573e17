//! Per-source confidence curves

use crate::config::SourcesConfig;
use crate::constants::sources::*;
use crate::types::{DepthReading, SourceTag};

use super::{piecewise_linear, tiered};

/// Stateless per-source weighting
///
/// Only the neural cap is configurable; every other curve is fixed by its
/// knot table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConfidenceModel {
    neural_max_m: f64,
}

impl Default for SourceConfidenceModel {
    fn default() -> Self {
        Self::new(NEURAL_DEFAULT_MAX_M)
    }
}

impl SourceConfidenceModel {
    /// Model with an explicit neural cap, clamped to the accepted range
    pub fn new(neural_max_m: f64) -> Self {
        Self {
            neural_max_m: neural_max_m.clamp(NEURAL_MIN_MAX_M, NEURAL_MAX_MAX_M),
        }
    }

    /// Model for a source configuration section
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new(config.neural_max_distance_m)
    }

    /// Neural hard cap (m)
    pub fn neural_max_m(&self) -> f64 {
        self.neural_max_m
    }

    /// Short-range depth sensor curve
    pub fn short_range(&self, distance_m: f64) -> f32 {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return 0.0;
        }
        piecewise_linear(SHORT_RANGE_KNOTS, distance_m)
    }

    /// Neural depth curve, zero at and beyond the cap
    ///
    /// ```text
    ///  0.9 ┤        ┌──────┐
    ///      │       ╱        ╲
    ///  0.35┤      ╱           ╲___
    ///  0.3 ┤─────╯                 ╲ 0.2
    ///  0   ┼─────┬────┬──────┬────┬─┴──
    ///      0     2    8     15  0.8C  C
    /// ```
    pub fn neural(&self, distance_m: f64) -> f32 {
        if !distance_m.is_finite() || distance_m <= 0.0 || distance_m >= self.neural_max_m {
            return 0.0;
        }
        let tail_start = 0.8 * self.neural_max_m;
        let knots = [
            (NEURAL_RAMP_START_M, NEURAL_NEAR_WEIGHT),
            (NEURAL_PLATEAU_START_M, NEURAL_PLATEAU_WEIGHT),
            (NEURAL_PLATEAU_END_M, NEURAL_PLATEAU_WEIGHT),
            (tail_start, NEURAL_TAIL_WEIGHT),
            (self.neural_max_m, NEURAL_CAP_WEIGHT),
        ];
        piecewise_linear(&knots, distance_m)
    }

    /// Geometric ground-plane curve
    pub fn geometric(&self, distance_m: f64) -> f32 {
        piecewise_linear(GEOMETRIC_KNOTS, distance_m)
    }

    /// Terrain curve before accuracy factors
    pub fn terrain_distance(&self, distance_m: f64) -> f32 {
        piecewise_linear(TERRAIN_KNOTS, distance_m)
    }

    /// Terrain weight with GPS and heading accuracy factors
    pub fn terrain(&self, distance_m: f64, gps_accuracy_m: f64, heading_accuracy_deg: f64) -> f32 {
        self.terrain_distance(distance_m)
            * gps_factor(gps_accuracy_m)
            * heading_factor(heading_accuracy_deg)
    }

    /// Object-size weight scaled by detection confidence
    pub fn object_size(&self, distance_m: f64, detection_confidence: f32) -> f32 {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return 0.0;
        }
        piecewise_linear(OBJECT_KNOTS, distance_m) * detection_confidence.clamp(0.0, 1.0)
    }

    /// Selector weight for a reading
    ///
    /// Terrain and geometric readings carry their final confidence already.
    pub fn weight(&self, reading: &DepthReading) -> f32 {
        if !reading.is_valid() {
            return 0.0;
        }
        let d = reading.distance_m;
        let conf = reading.confidence;
        let weight = match reading.source {
            SourceTag::Manual => conf,
            SourceTag::ShortRange => self.short_range(d) * conf,
            SourceTag::ObjectSize => self.object_size(d, conf),
            SourceTag::Terrain => conf,
            SourceTag::Neural => self.neural(d) * conf,
            SourceTag::Geometric => conf,
        };
        weight.clamp(0.0, 1.0)
    }
}

/// GPS horizontal accuracy factor
pub fn gps_factor(accuracy_m: f64) -> f32 {
    tiered(GPS_ACCURACY_TIERS, GPS_ACCURACY_FLOOR, accuracy_m)
}

/// Heading accuracy factor
pub fn heading_factor(accuracy_deg: f64) -> f32 {
    tiered(HEADING_ACCURACY_TIERS, HEADING_ACCURACY_FLOOR, accuracy_deg)
}

/// Vertical accuracy factor
pub fn altitude_factor(accuracy_m: f64) -> f32 {
    tiered(ALTITUDE_ACCURACY_TIERS, ALTITUDE_ACCURACY_FLOOR, accuracy_m)
}
