//! Ground-Plane Geometric Ranging
//!
//! Assumes the target stands on a flat ground plane below the device. With the
//! device `h` metres above the plane and aimed `θ` below horizontal:
//!
//! ```text
//!   device ●─────────────────────── horizon
//!          │ ╲  θ
//!        h │   ╲
//!          │     ╲
//!   ───────┴───────● target ──── ground
//!          ├── D ──┤        D = h / tan θ
//! ```
//!
//! Pitch error dominates: `dD/dθ = h / sin²θ`, so the same 0.25° attitude
//! noise that is harmless at 10 m becomes tens of metres near the horizon.
//! Estimates are therefore only produced between 5 m and 800 m, and steep aims
//! (more than 3° down) are penalised because they usually hit sloping ground.

use crate::confidence::SourceConfidenceModel;
use crate::constants::sources::{
    GEOMETRIC_MAX_M, GEOMETRIC_MIN_DEPRESSION_DEG, GEOMETRIC_MIN_M, PITCH_NOISE_DEG,
    SLOPE_PENALTY_FLOOR, SLOPE_PENALTY_PER_DEG, SLOPE_PENALTY_START_DEG,
};
use crate::time::Timestamp;
use crate::types::{DepthReading, SourceTag};

/// One geometric estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricEstimate {
    /// Ground distance along the line of sight (m)
    pub distance_m: f64,
    /// Curve weight × slope penalty
    pub confidence: f32,
    /// One-sigma uncertainty from pitch noise (m)
    pub uncertainty_m: f64,
    /// Slope-risk factor in [0.4, 1]
    pub slope_penalty: f64,
}

/// Flat-ground ranger
#[derive(Debug, Clone, Copy)]
pub struct GeometricRanger {
    device_height_m: f64,
    model: SourceConfidenceModel,
}

impl GeometricRanger {
    /// Ranger for a device held `device_height_m` above the ground
    pub fn new(device_height_m: f64, model: SourceConfidenceModel) -> Self {
        Self {
            device_height_m,
            model,
        }
    }

    /// Estimate from pitch (rad, negative = down)
    pub fn estimate(&self, pitch_rad: f64) -> Option<GeometricEstimate> {
        if !pitch_rad.is_finite() || self.device_height_m <= 0.0 {
            return None;
        }
        let depression = -pitch_rad;
        let depression_deg = depression.to_degrees();
        if depression_deg <= GEOMETRIC_MIN_DEPRESSION_DEG || depression_deg >= 90.0 {
            return None;
        }

        let distance = self.device_height_m / libm::tan(depression);
        if !(GEOMETRIC_MIN_M..=GEOMETRIC_MAX_M).contains(&distance) {
            return None;
        }

        let penalty = slope_penalty(depression_deg);
        let sin = libm::sin(depression);
        let uncertainty = self.device_height_m / (sin * sin) * PITCH_NOISE_DEG.to_radians();

        Some(GeometricEstimate {
            distance_m: distance,
            confidence: (f64::from(self.model.geometric(distance)) * penalty) as f32,
            uncertainty_m: uncertainty,
            slope_penalty: penalty,
        })
    }

    /// Estimate packaged as a selector reading
    pub fn reading(&self, pitch_rad: f64, timestamp: Timestamp) -> Option<DepthReading> {
        self.estimate(pitch_rad).map(|e| {
            DepthReading::new(SourceTag::Geometric, e.distance_m, e.confidence, timestamp)
                .with_uncertainty(e.uncertainty_m)
        })
    }
}

/// Slope-risk factor for a depression angle (deg)
pub fn slope_penalty(depression_deg: f64) -> f64 {
    if depression_deg <= SLOPE_PENALTY_START_DEG {
        return 1.0;
    }
    (1.0 - SLOPE_PENALTY_PER_DEG * (depression_deg - SLOPE_PENALTY_START_DEG)).max(SLOPE_PENALTY_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranger() -> GeometricRanger {
        GeometricRanger::new(1.5, SourceConfidenceModel::default())
    }

    #[test]
    fn ten_metres_at_known_tilt() {
        let pitch = -libm::atan(1.5 / 10.0);
        let est = ranger().estimate(pitch).unwrap();
        assert!((est.distance_m - 10.0).abs() < 0.5);
    }

    #[test]
    fn no_estimate_near_horizon_or_upward() {
        assert!(ranger().estimate((-0.2f64).to_radians()).is_none());
        assert!(ranger().estimate(0.0).is_none());
        assert!(ranger().estimate(0.1).is_none());
    }

    #[test]
    fn no_estimate_outside_band() {
        // 1.5 / tan(30°) ≈ 2.6 m
        assert!(ranger().estimate((-30.0f64).to_radians()).is_none());
        // 1.5 / tan(0.1°) ≈ 860 m, below the 0.3° gate anyway
        assert!(ranger().estimate((-0.1f64).to_radians()).is_none());
    }

    #[test]
    fn slope_penalty_reduces_confidence() {
        assert_eq!(slope_penalty(3.0), 1.0);
        assert!(slope_penalty(3.5) < 1.0);
        assert_eq!(slope_penalty(40.0), 0.4);

        let model = SourceConfidenceModel::default();
        let est = ranger().estimate((-6.0f64).to_radians()).unwrap();
        assert!(est.confidence < model.geometric(est.distance_m));
    }

    #[test]
    fn uncertainty_grows_toward_horizon() {
        let steep = ranger().estimate((-8.0f64).to_radians()).unwrap();
        let shallow = ranger().estimate((-1.0f64).to_radians()).unwrap();
        assert!(shallow.uncertainty_m > steep.uncertainty_m * 10.0);
    }

    #[test]
    fn reading_carries_uncertainty() {
        let reading = ranger().reading((-2.0f64).to_radians(), 42).unwrap();
        assert_eq!(reading.source, SourceTag::Geometric);
        assert_eq!(reading.timestamp, 42);
        assert!(reading.uncertainty_m > 0.0);
    }
}
