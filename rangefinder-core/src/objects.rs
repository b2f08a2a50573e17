//! Pinhole Ranging Against Known Sizes
//!
//! A target of known height `H` spanning `p` pixels through a lens of focal
//! length `f` (pixels) sits at `D = H · f / p`. The same relation serves two
//! sources:
//!
//! - **ObjectSize**: the detector names the object, the size table supplies `H`
//!   and the bounding-box height supplies `p`.
//! - **Manual**: the operator brackets a target of stated size on screen.
//!
//! A detection only ranges the aim point if the aim lies within a small angular
//! tolerance of its bounding box.

use log::debug;

use crate::config::{ObjectsConfig, RangingConfig};
use crate::confidence::SourceConfidenceModel;
use crate::constants::tracking::{MANUAL_CONFIDENCE, MANUAL_UNCERTAINTY, OBJECT_UNCERTAINTY};
use crate::time::Timestamp;
use crate::types::{DepthReading, SourceTag};

/// Image geometry needed to turn pixels into angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Focal length (pixels)
    pub focal_px: f64,
    /// Image width (pixels)
    pub width_px: f64,
    /// Image height (pixels)
    pub height_px: f64,
}

impl Camera {
    /// Camera with the given focal length and image size
    pub fn new(focal_px: f64, width_px: f64, height_px: f64) -> Self {
        Self {
            focal_px,
            width_px,
            height_px,
        }
    }

    fn is_usable(&self) -> bool {
        self.focal_px > 0.0 && self.width_px > 0.0 && self.height_px > 0.0
    }

    /// Angle between two normalized image points (deg)
    pub fn angle_between(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let dx = (a.0 - b.0) * self.width_px;
        let dy = (a.1 - b.1) * self.height_px;
        libm::atan2(libm::sqrt(dx * dx + dy * dy), self.focal_px).to_degrees()
    }
}

/// Axis-aligned box in normalized image coordinates (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormalizedBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl NormalizedBox {
    /// Box from its top-left corner and size
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Closest point of the box to `p` (equal to `p` when inside)
    pub fn closest_point(&self, p: (f64, f64)) -> (f64, f64) {
        (
            p.0.clamp(self.x, self.x + self.width),
            p.1.clamp(self.y, self.y + self.height),
        )
    }
}

/// One object detection
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    /// Class label
    pub label: String,
    /// Bounding box
    pub bbox: NormalizedBox,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
}

impl Detection {
    /// Detection of `label` in `bbox`
    pub fn new(label: &str, bbox: NormalizedBox, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            bbox,
            confidence,
        }
    }
}

/// Operator bracket ranging input
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManualRanging {
    /// Stated target size (m)
    pub target_size_m: f64,
    /// Bracketed span on screen (pixels)
    pub pixel_span: f64,
}

/// `size · focal / span`, or `None` for degenerate inputs
pub fn pinhole_distance(size_m: f64, focal_px: f64, span_px: f64) -> Option<f64> {
    let d = size_m * focal_px / span_px;
    (size_m > 0.0 && focal_px > 0.0 && span_px > 0.0 && d.is_finite()).then_some(d)
}

/// Object-size and manual ranging
#[derive(Debug, Clone)]
pub struct ObjectRanger {
    objects: ObjectsConfig,
    aim_tolerance_deg: f64,
    model: SourceConfidenceModel,
}

impl ObjectRanger {
    /// Ranger using the size table, aim tolerance and curves of `config`
    pub fn new(config: &RangingConfig) -> Self {
        Self {
            objects: config.objects.clone(),
            aim_tolerance_deg: config.selector.object_aim_tolerance_deg,
            model: SourceConfidenceModel::from_config(&config.sources),
        }
    }

    /// Angle from the aim point to the nearest edge of a detection (deg)
    pub fn aim_offset_deg(camera: &Camera, detection: &Detection, aim: (f64, f64)) -> f64 {
        camera.angle_between(aim, detection.bbox.closest_point(aim))
    }

    /// Range a single detection regardless of where it sits
    pub fn range(&self, camera: &Camera, detection: &Detection, timestamp: Timestamp) -> Option<DepthReading> {
        if !camera.is_usable() || detection.confidence < self.objects.min_detection_confidence {
            return None;
        }
        let size = self.objects.height_for(&detection.label)?;
        let span = detection.bbox.height * camera.height_px;
        let distance = pinhole_distance(size, camera.focal_px, span)?;
        Some(
            DepthReading::new(SourceTag::ObjectSize, distance, detection.confidence, timestamp)
                .with_uncertainty(distance * OBJECT_UNCERTAINTY),
        )
    }

    /// Best ranged detection within the aim tolerance, by selector weight
    pub fn at_aim(
        &self,
        camera: &Camera,
        detections: &[Detection],
        aim: (f64, f64),
        timestamp: Timestamp,
    ) -> Option<DepthReading> {
        let best = detections
            .iter()
            .filter(|d| Self::aim_offset_deg(camera, d, aim) <= self.aim_tolerance_deg)
            .filter_map(|d| self.range(camera, d, timestamp))
            .map(|r| (self.model.weight(&r), r))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, r)| r);
        if let Some(r) = &best {
            debug!("object at aim: {:.1} m (conf {:.2})", r.distance_m, r.confidence);
        }
        best
    }

    /// Manual bracket ranging reading
    pub fn manual(&self, camera: &Camera, manual: &ManualRanging, timestamp: Timestamp) -> Option<DepthReading> {
        let distance = pinhole_distance(manual.target_size_m, camera.focal_px, manual.pixel_span)?;
        Some(
            DepthReading::new(SourceTag::Manual, distance, MANUAL_CONFIDENCE, timestamp)
                .with_uncertainty(distance * MANUAL_UNCERTAINTY),
        )
    }
}
