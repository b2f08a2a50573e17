//! Ranging Data Model
//!
//! Plain value types shared by every component. Everything here is `Copy`
//! (or cheap to clone) and derives `serde::Serialize` so frame results can be
//! logged or exported without conversion.
//!
//! ```text
//! sensors ──► DepthReading ──► SourceEntry{weight} ──► SemanticDecision
//!                                                          │
//!                                      tracker ◄───────────┘
//!                                         │
//!                                         ▼
//!                              RangeOutput (fg) + RangeOutput (bg)
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::tracking::{STATIONARY_MAX_RAD_S, TRACKING_MAX_RAD_S};
use crate::time::Timestamp;

/// Distance-measuring source
///
/// Closed set; every dispatch over sources is an exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTag {
    /// Operator bracket ranging against a known target size
    Manual,
    /// Time-of-flight / structured light depth sensor
    ShortRange,
    /// Pinhole ranging from a detected object of known size
    ObjectSize,
    /// Ray intersection against an elevation model
    Terrain,
    /// Calibrated monocular neural depth
    Neural,
    /// Ground-plane geometry from device height and tilt
    Geometric,
}

impl SourceTag {
    /// Every source, in selection priority order
    pub const ALL: [SourceTag; 6] = [
        SourceTag::Manual,
        SourceTag::ShortRange,
        SourceTag::ObjectSize,
        SourceTag::Terrain,
        SourceTag::Neural,
        SourceTag::Geometric,
    ];

    /// Short lowercase name for logs
    pub fn name(self) -> &'static str {
        match self {
            SourceTag::Manual => "manual",
            SourceTag::ShortRange => "short_range",
            SourceTag::ObjectSize => "object_size",
            SourceTag::Terrain => "terrain",
            SourceTag::Neural => "neural",
            SourceTag::Geometric => "geometric",
        }
    }
}

/// One distance estimate from one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthReading {
    /// Line-of-sight distance (m), > 0 when valid
    pub distance_m: f64,
    /// Source-reported confidence in [0, 1]
    pub confidence: f32,
    /// One-sigma uncertainty (m)
    pub uncertainty_m: f64,
    /// Producing source
    pub source: SourceTag,
    /// Capture time
    pub timestamp: Timestamp,
}

impl DepthReading {
    /// Build a reading, clamping confidence into [0, 1]
    pub fn new(source: SourceTag, distance_m: f64, confidence: f32, timestamp: Timestamp) -> Self {
        Self {
            distance_m,
            confidence: confidence.clamp(0.0, 1.0),
            uncertainty_m: 0.0,
            source,
            timestamp,
        }
    }

    /// Invalid sentinel: zero distance, zero confidence
    pub fn invalid(source: SourceTag, timestamp: Timestamp) -> Self {
        Self {
            distance_m: 0.0,
            confidence: 0.0,
            uncertainty_m: 0.0,
            source,
            timestamp,
        }
    }

    /// Attach an uncertainty
    pub fn with_uncertainty(mut self, uncertainty_m: f64) -> Self {
        self.uncertainty_m = uncertainty_m.max(0.0);
        self
    }

    /// Positive finite distance with non-zero confidence
    pub fn is_valid(&self) -> bool {
        self.distance_m.is_finite() && self.distance_m > 0.0 && self.confidence > 0.0
    }
}

/// A reading paired with the weight its source earned this frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceEntry {
    /// Source of the reading
    pub source: SourceTag,
    /// The reading itself
    pub reading: DepthReading,
    /// Distance-dependent weight in [0, 1]
    pub weight: f32,
}

impl SourceEntry {
    /// Entry for `reading`, weight clamped into [0, 1]
    pub fn new(reading: DepthReading, weight: f32) -> Self {
        Self {
            source: reading.source,
            reading,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

/// Per-source weight table reported with each output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SourceWeights {
    /// Manual ranging weight
    pub manual: f32,
    /// Short-range sensor weight
    pub short_range: f32,
    /// Object-size weight
    pub object_size: f32,
    /// Terrain weight
    pub terrain: f32,
    /// Neural depth weight
    pub neural: f32,
    /// Geometric weight
    pub geometric: f32,
}

impl SourceWeights {
    /// Weight recorded for `tag`
    pub fn get(&self, tag: SourceTag) -> f32 {
        match tag {
            SourceTag::Manual => self.manual,
            SourceTag::ShortRange => self.short_range,
            SourceTag::ObjectSize => self.object_size,
            SourceTag::Terrain => self.terrain,
            SourceTag::Neural => self.neural,
            SourceTag::Geometric => self.geometric,
        }
    }

    /// Record the weight for `tag`
    pub fn set(&mut self, tag: SourceTag, weight: f32) {
        let slot = match tag {
            SourceTag::Manual => &mut self.manual,
            SourceTag::ShortRange => &mut self.short_range,
            SourceTag::ObjectSize => &mut self.object_size,
            SourceTag::Terrain => &mut self.terrain,
            SourceTag::Neural => &mut self.neural,
            SourceTag::Geometric => &mut self.geometric,
        };
        *slot = weight;
    }

    /// Build from a set of entries; absent sources weigh zero
    pub fn from_entries(entries: &[SourceEntry]) -> Self {
        let mut weights = Self::default();
        for entry in entries {
            weights.set(entry.source, entry.weight);
        }
        weights
    }
}

/// Coarse scene class at the aim point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SceneClass {
    /// Open sky, nothing to range
    Sky,
    /// Receding ground plane
    Ground,
    /// Depth edge (building, tree line, vehicle)
    Structure,
    /// None of the above
    #[default]
    Unknown,
}

/// Scene class with the classifier's confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneClassification {
    /// Detected class
    pub class: SceneClass,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl Default for SceneClassification {
    fn default() -> Self {
        Self {
            class: SceneClass::Unknown,
            confidence: 0.0,
        }
    }
}

/// Dual-peak depth distribution result
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BimodalAnalysis {
    /// Both clusters passed every test
    pub is_bimodal: bool,
    /// Median of the near cluster (m)
    pub near_peak_m: f64,
    /// Median of the far cluster (m)
    pub far_peak_m: f64,
    /// Share of samples in the near cluster
    pub near_fraction: f32,
    /// Share of samples in the far cluster
    pub far_fraction: f32,
    /// A terrain estimate lies within tolerance of the far cluster
    pub terrain_agrees_with_far: bool,
}

impl BimodalAnalysis {
    /// Unimodal (or undecidable) result
    pub fn unimodal() -> Self {
        Self::default()
    }
}

/// Geodetic point (WGS-84 degrees, metres above mean sea level)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude (deg)
    pub latitude: f64,
    /// Longitude (deg)
    pub longitude: f64,
    /// Altitude (m)
    pub altitude_m: f64,
}

impl GeoPoint {
    /// Construct a point
    pub fn new(latitude: f64, longitude: f64, altitude_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m,
        }
    }
}

/// Outcome of a terrain ray intersection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainRayResult {
    /// Slant distance from the observer to the hit (m)
    pub distance_m: f64,
    /// Terrain elevation at the hit (m)
    pub terrain_elevation_m: f64,
    /// Combined curve and accuracy confidence
    pub confidence: f32,
    /// GPS horizontal accuracy at cast time (m)
    pub gps_accuracy_m: f64,
    /// Heading accuracy at cast time (deg)
    pub heading_accuracy_deg: f64,
    /// Intersection point
    pub hit: GeoPoint,
}

/// Which source the selector promoted this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SemanticDecision {
    /// Manual bracket ranging overrides everything
    ManualPrimary,
    /// Short-range sensor inside its band
    ShortRangePrimary,
    /// Known-size object at the aim point
    ObjectPrimary,
    /// Terrain ray intersection
    TerrainPrimary,
    /// Calibrated neural depth
    NeuralPrimary,
    /// Ground-plane geometry
    GeometricPrimary,
    /// No qualifying source
    #[default]
    None,
}

impl SemanticDecision {
    /// Source backing this decision
    pub fn source(self) -> Option<SourceTag> {
        match self {
            SemanticDecision::ManualPrimary => Some(SourceTag::Manual),
            SemanticDecision::ShortRangePrimary => Some(SourceTag::ShortRange),
            SemanticDecision::ObjectPrimary => Some(SourceTag::ObjectSize),
            SemanticDecision::TerrainPrimary => Some(SourceTag::Terrain),
            SemanticDecision::NeuralPrimary => Some(SourceTag::Neural),
            SemanticDecision::GeometricPrimary => Some(SourceTag::Geometric),
            SemanticDecision::None => None,
        }
    }

    /// Decision that promotes `tag`
    pub fn for_source(tag: SourceTag) -> Self {
        match tag {
            SourceTag::Manual => SemanticDecision::ManualPrimary,
            SourceTag::ShortRange => SemanticDecision::ShortRangePrimary,
            SourceTag::ObjectSize => SemanticDecision::ObjectPrimary,
            SourceTag::Terrain => SemanticDecision::TerrainPrimary,
            SourceTag::Neural => SemanticDecision::NeuralPrimary,
            SourceTag::Geometric => SemanticDecision::GeometricPrimary,
        }
    }
}

/// Device motion tier derived from angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// Braced or resting
    Stationary,
    /// Slow deliberate movement following a target
    Tracking,
    /// Sweeping across the scene
    Panning,
}

impl MotionState {
    /// Classify an angular speed (rad/s)
    pub fn from_angular_velocity(rad_per_s: f64) -> Self {
        let speed = rad_per_s.abs();
        if speed < STATIONARY_MAX_RAD_S {
            MotionState::Stationary
        } else if speed < TRACKING_MAX_RAD_S {
            MotionState::Tracking
        } else {
            MotionState::Panning
        }
    }
}

/// Final per-hypothesis output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeOutput {
    /// Filtered line-of-sight distance (m)
    pub line_of_sight_m: f64,
    /// Horizontal-equivalent distance for inclined shots (m)
    pub slope_corrected_m: f64,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// One-sigma uncertainty (m)
    pub uncertainty_m: f64,
    /// Device inclination (deg, negative = down)
    pub inclination_deg: f64,
    /// cos(inclination) applied to obtain the slope-corrected distance
    pub correction_factor: f64,
    /// Source backing this output
    pub primary_source: Option<SourceTag>,
    /// Weights every source earned this frame
    pub source_weights: SourceWeights,
    /// Capture time
    pub timestamp: Timestamp,
}

impl RangeOutput {
    /// No-estimate output: zero distance, zero confidence
    pub fn none(timestamp: Timestamp) -> Self {
        Self {
            line_of_sight_m: 0.0,
            slope_corrected_m: 0.0,
            confidence: 0.0,
            uncertainty_m: 0.0,
            inclination_deg: 0.0,
            correction_factor: 1.0,
            primary_source: None,
            source_weights: SourceWeights::default(),
            timestamp,
        }
    }

    /// Output for a filtered distance at a given pitch (rad)
    pub fn from_distance(
        distance_m: f64,
        confidence: f32,
        uncertainty_m: f64,
        pitch_rad: f64,
        source: Option<SourceTag>,
        timestamp: Timestamp,
    ) -> Self {
        let correction = libm::cos(pitch_rad).abs();
        Self {
            line_of_sight_m: distance_m,
            slope_corrected_m: distance_m * correction,
            confidence: confidence.clamp(0.0, 1.0),
            uncertainty_m,
            inclination_deg: pitch_rad.to_degrees(),
            correction_factor: correction,
            primary_source: source,
            source_weights: SourceWeights::default(),
            timestamp,
        }
    }

    /// Attach the frame's weight table
    pub fn with_weights(mut self, weights: SourceWeights) -> Self {
        self.source_weights = weights;
        self
    }

    /// Carries a usable distance
    pub fn has_estimate(&self) -> bool {
        self.primary_source.is_some() && self.line_of_sight_m > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel() {
        let reading = DepthReading::invalid(SourceTag::Neural, 10);
        assert!(!reading.is_valid());
        assert_eq!(reading.distance_m, 0.0);
        assert_eq!(reading.confidence, 0.0);
    }

    #[test]
    fn decision_source_round_trip() {
        for tag in SourceTag::ALL {
            assert_eq!(SemanticDecision::for_source(tag).source(), Some(tag));
        }
        assert_eq!(SemanticDecision::None.source(), None);
    }

    #[test]
    fn weights_table() {
        let entries = [
            SourceEntry::new(DepthReading::new(SourceTag::Terrain, 400.0, 0.9, 0), 0.93),
            SourceEntry::new(DepthReading::new(SourceTag::Neural, 380.0, 0.5, 0), 1.7),
        ];
        let weights = SourceWeights::from_entries(&entries);
        assert_eq!(weights.get(SourceTag::Terrain), 0.93);
        assert_eq!(weights.get(SourceTag::Neural), 1.0);
        assert_eq!(weights.get(SourceTag::Manual), 0.0);
    }

    #[test]
    fn motion_tiers() {
        assert_eq!(MotionState::from_angular_velocity(0.01), MotionState::Stationary);
        assert_eq!(MotionState::from_angular_velocity(-0.1), MotionState::Tracking);
        assert_eq!(MotionState::from_angular_velocity(0.5), MotionState::Panning);
    }

    #[test]
    fn slope_correction() {
        let out = RangeOutput::from_distance(100.0, 0.9, 2.0, (-30.0f64).to_radians(), Some(SourceTag::Terrain), 0);
        assert!((out.slope_corrected_m - 86.6025).abs() < 1e-3);
        assert!((out.inclination_deg + 30.0).abs() < 1e-9);
        assert!(out.has_estimate());
        assert!(!RangeOutput::none(0).has_estimate());
    }
}
