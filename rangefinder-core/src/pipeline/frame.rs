//! Per-frame inputs and outputs

use serde::Serialize;

use crate::calibration::FitStatus;
use crate::objects::{Camera, Detection, ManualRanging};
use crate::scene::DepthMap;
use crate::time::Timestamp;
use crate::types::{
    BimodalAnalysis, GeoPoint, RangeOutput, SceneClassification, SemanticDecision, SourceWeights,
    TerrainRayResult,
};

/// Device attitude
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    /// Pitch (rad, negative = down)
    pub pitch_rad: f64,
    /// Heading (deg clockwise from true north)
    pub heading_deg: f64,
    /// Angular speed (rad/s)
    pub angular_velocity_rad_s: f64,
    /// Heading accuracy (deg)
    pub heading_accuracy_deg: f64,
}

/// GNSS fix
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionFix {
    /// Position and altitude
    pub point: GeoPoint,
    /// Horizontal accuracy (m)
    pub horizontal_accuracy_m: f64,
    /// Vertical accuracy (m)
    pub vertical_accuracy_m: f64,
}

/// Everything sensed for one frame
///
/// Absent fields mean the sensor is unavailable this frame; its source simply
/// does not compete.
#[derive(Debug, Clone)]
pub struct FrameInput {
    /// Capture time
    pub timestamp: Timestamp,
    /// Aim point in normalized image coordinates
    pub aim: (f64, f64),
    /// Short-range metric depth (with its confidence map)
    pub short_range: Option<DepthMap>,
    /// Raw neural depth, inverse-relative
    pub neural: Option<DepthMap>,
    /// Device attitude
    pub orientation: Orientation,
    /// GNSS fix
    pub position: Option<PositionFix>,
    /// Camera intrinsics for pixel-based ranging
    pub camera: Option<Camera>,
    /// Object detections
    pub detections: Vec<Detection>,
    /// Operator bracket ranging
    pub manual: Option<ManualRanging>,
    /// Terrain result computed elsewhere (skips the in-frame cast)
    pub terrain: Option<TerrainRayResult>,
}

impl FrameInput {
    /// Frame aimed at the image centre with no sensors attached
    pub fn new(timestamp: Timestamp, orientation: Orientation) -> Self {
        Self {
            timestamp,
            aim: (0.5, 0.5),
            short_range: None,
            neural: None,
            orientation,
            position: None,
            camera: None,
            detections: Vec::new(),
            manual: None,
            terrain: None,
        }
    }

    /// Attach a short-range depth map
    pub fn with_short_range(mut self, map: DepthMap) -> Self {
        self.short_range = Some(map);
        self
    }

    /// Attach a raw neural depth map
    pub fn with_neural(mut self, map: DepthMap) -> Self {
        self.neural = Some(map);
        self
    }

    /// Attach a GNSS fix
    pub fn with_position(mut self, fix: PositionFix) -> Self {
        self.position = Some(fix);
        self
    }

    /// Attach camera intrinsics
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Attach object detections
    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    /// Attach manual ranging
    pub fn with_manual(mut self, manual: ManualRanging) -> Self {
        self.manual = Some(manual);
        self
    }

    /// Attach a precomputed terrain result
    pub fn with_terrain(mut self, result: TerrainRayResult) -> Self {
        self.terrain = Some(result);
        self
    }
}

/// Everything produced for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    /// Capture time
    pub timestamp: Timestamp,
    /// Foreground distance
    pub foreground: RangeOutput,
    /// Background distance
    pub background: RangeOutput,
    /// Source promoted this frame
    pub decision: SemanticDecision,
    /// Gated per-source weights
    pub weights: SourceWeights,
    /// Scene class at the aim point
    pub scene: SceneClassification,
    /// Bimodal analysis, when a depth map was available
    pub bimodal: Option<BimodalAnalysis>,
    /// Terrain intersection point
    pub terrain_hit: Option<GeoPoint>,
    /// Outcome of this frame's calibration sample
    #[serde(skip)]
    pub calibration: Option<FitStatus>,
}
