//! Ranging Configuration
//!
//! One serde-backed struct holds every tunable of the core. Each component
//! owns a section and receives a copy (or reference) of it at construction:
//!
//! ```text
//! RangingConfig
//! ├── sources      neural cap, device height
//! ├── calibration  window, decay, ground-truth band, compression knee
//! ├── scene        classification cadence
//! ├── bimodal      cluster thresholds
//! ├── terrain      search distance, tile cache, result reuse
//! ├── selector     per-decision weight thresholds
//! ├── tracker      smoothing and outlier policy
//! └── objects      known-size table
//! ```
//!
//! Every section is `#[serde(default)]`, so a JSON file only needs the keys it
//! overrides:
//!
//! ```rust
//! use rangefinder_core::config::RangingConfig;
//!
//! let config = RangingConfig::from_json_str(r#"{ "sources": { "neural_max_distance_m": 50.0 } }"#)?;
//! assert_eq!(config.sources.neural_max_distance_m, 50.0);
//! assert_eq!(config.terrain.tile_cache_capacity, 9);
//! # Ok::<(), rangefinder_core::errors::RangeError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::TransformFamily;
use crate::constants::{calibration as cal, scene, sources, terrain, tracking};
use crate::errors::{RangeError, RangeResult};

/// Complete configuration for the ranging core
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    /// Source confidence and geometry parameters
    pub sources: SourcesConfig,
    /// Cross-sensor calibration
    pub calibration: CalibrationConfig,
    /// Scene classification
    pub scene: SceneConfig,
    /// Bimodal depth analysis
    pub bimodal: BimodalConfig,
    /// Terrain ray casting
    pub terrain: TerrainConfig,
    /// Semantic source selection
    pub selector: SelectorConfig,
    /// Dual-hypothesis tracking
    pub tracker: TrackerConfig,
    /// Object-size ranging
    pub objects: ObjectsConfig,
}

impl RangingConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> RangeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> RangeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> RangeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RangeError::Config(e.to_string()))
    }

    /// Set the neural hard cap (m)
    pub fn with_neural_max_distance(mut self, meters: f64) -> Self {
        self.sources.neural_max_distance_m = meters;
        self
    }

    /// Set the device height above ground (m)
    pub fn with_device_height(mut self, meters: f64) -> Self {
        self.sources.device_height_m = meters;
        self
    }

    /// Force a calibration transform family
    pub fn with_forced_family(mut self, family: TransformFamily) -> Self {
        self.calibration.forced_family = Some(family);
        self
    }

    /// Set the terrain search distance (m)
    pub fn with_max_search_distance(mut self, meters: f64) -> Self {
        self.terrain.max_search_m = meters;
        self
    }

    /// Check every section for internally consistent values
    pub fn validate(&self) -> RangeResult<()> {
        self.sources.validate()?;
        self.calibration.validate()?;
        self.scene.validate()?;
        self.bimodal.validate()?;
        self.terrain.validate()?;
        self.selector.validate()?;
        self.tracker.validate()?;
        self.objects.validate()
    }
}

fn ensure(condition: bool, message: &str) -> RangeResult<()> {
    if condition {
        Ok(())
    } else {
        Err(RangeError::Config(message.to_string()))
    }
}

fn is_unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Source-level parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Neural hard cap (m); weight is zero at and beyond it
    pub neural_max_distance_m: f64,
    /// Height of the device above the ground plane (m)
    pub device_height_m: f64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            neural_max_distance_m: sources::NEURAL_DEFAULT_MAX_M,
            device_height_m: 1.5,
        }
    }
}

impl SourcesConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(
            (sources::NEURAL_MIN_MAX_M..=sources::NEURAL_MAX_MAX_M).contains(&self.neural_max_distance_m),
            "sources.neural_max_distance_m must be within [20, 500]",
        )?;
        ensure(
            self.device_height_m > 0.0 && self.device_height_m < 10.0,
            "sources.device_height_m must be within (0, 10)",
        )
    }
}

/// Calibration window and transform parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Samples kept in the rolling window
    pub window_capacity: usize,
    /// Per-second weight decay in (0, 1]
    pub decay_per_second: f64,
    /// Nearest accepted ground truth (m)
    pub ground_truth_min_m: f64,
    /// Farthest accepted ground truth (m)
    pub ground_truth_max_m: f64,
    /// Distance beyond which output is soft-compressed (m)
    pub compression_knee_m: f64,
    /// Skip family detection and use this family
    pub forced_family: Option<TransformFamily>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_capacity: cal::DEFAULT_WINDOW_CAPACITY,
            decay_per_second: cal::DEFAULT_DECAY_PER_SECOND,
            ground_truth_min_m: cal::GROUND_TRUTH_MIN_M,
            ground_truth_max_m: cal::GROUND_TRUTH_MAX_M,
            compression_knee_m: cal::DEFAULT_COMPRESSION_KNEE_M,
            forced_family: None,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(
            self.window_capacity >= cal::MIN_FIT_SAMPLES
                && self.window_capacity <= cal::MAX_CALIBRATION_SAMPLES,
            "calibration.window_capacity must be within [5, 64]",
        )?;
        ensure(
            self.decay_per_second > 0.0 && self.decay_per_second <= 1.0,
            "calibration.decay_per_second must be within (0, 1]",
        )?;
        ensure(
            self.ground_truth_min_m > 0.0 && self.ground_truth_min_m < self.ground_truth_max_m,
            "calibration ground-truth band is empty",
        )?;
        ensure(
            self.compression_knee_m > self.ground_truth_max_m,
            "calibration.compression_knee_m must lie beyond the ground-truth band",
        )
    }
}

/// Scene classifier cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Recompute the class every N frames
    pub classify_every_n_frames: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            classify_every_n_frames: scene::CLASSIFY_EVERY_N_FRAMES,
        }
    }
}

impl SceneConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(self.classify_every_n_frames >= 1, "scene.classify_every_n_frames must be >= 1")
    }
}

/// Bimodal detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BimodalConfig {
    /// Minimum share of samples per cluster
    pub min_cluster_fraction: f32,
    /// Minimum far/near peak ratio
    pub min_peak_separation: f64,
    /// Valley ceiling as a fraction of the smaller peak
    pub max_valley_fraction: f32,
    /// Relative error for terrain agreement
    pub terrain_agreement_tolerance: f64,
}

impl Default for BimodalConfig {
    fn default() -> Self {
        Self {
            min_cluster_fraction: scene::MIN_CLUSTER_FRACTION,
            min_peak_separation: scene::MIN_PEAK_SEPARATION,
            max_valley_fraction: scene::MAX_VALLEY_FRACTION,
            terrain_agreement_tolerance: scene::TERRAIN_AGREEMENT_TOLERANCE,
        }
    }
}

impl BimodalConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(
            self.min_cluster_fraction > 0.0 && self.min_cluster_fraction < 0.5,
            "bimodal.min_cluster_fraction must be within (0, 0.5)",
        )?;
        ensure(self.min_peak_separation > 1.0, "bimodal.min_peak_separation must exceed 1")?;
        ensure(
            is_unit(f64::from(self.max_valley_fraction)),
            "bimodal.max_valley_fraction must be within [0, 1]",
        )?;
        ensure(
            self.terrain_agreement_tolerance > 0.0,
            "bimodal.terrain_agreement_tolerance must be positive",
        )
    }
}

/// Terrain ray casting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Maximum slant distance searched (m)
    pub max_search_m: f64,
    /// Bisection iterations once a crossing is bracketed
    pub bisection_iterations: u32,
    /// Tiles held by the LRU cache
    pub tile_cache_capacity: usize,
    /// Minimum interval between casts (ms)
    pub min_cast_interval_ms: u64,
    /// Longest reuse while orientation is steady (ms)
    pub max_reuse_age_ms: u64,
    /// Heading change considered negligible (deg)
    pub negligible_heading_deg: f64,
    /// Pitch change considered negligible (deg)
    pub negligible_pitch_deg: f64,
    /// Observer movement considered negligible (m)
    pub negligible_move_m: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            max_search_m: terrain::DEFAULT_MAX_SEARCH_M,
            bisection_iterations: terrain::BISECTION_ITERATIONS,
            tile_cache_capacity: terrain::DEFAULT_TILE_CACHE_CAPACITY,
            min_cast_interval_ms: terrain::MIN_CAST_INTERVAL_MS,
            max_reuse_age_ms: terrain::MAX_REUSE_AGE_MS,
            negligible_heading_deg: terrain::NEGLIGIBLE_HEADING_DEG,
            negligible_pitch_deg: terrain::NEGLIGIBLE_PITCH_DEG,
            negligible_move_m: terrain::NEGLIGIBLE_MOVE_M,
        }
    }
}

impl TerrainConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(
            self.max_search_m > 0.0 && self.max_search_m <= 50_000.0,
            "terrain.max_search_m must be within (0, 50000]",
        )?;
        ensure(self.tile_cache_capacity >= 1, "terrain.tile_cache_capacity must be >= 1")?;
        ensure(
            self.max_reuse_age_ms >= self.min_cast_interval_ms,
            "terrain.max_reuse_age_ms must not be shorter than min_cast_interval_ms",
        )
    }
}

/// Selector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Short-range distances below this may become primary (m)
    pub short_range_max_m: f64,
    /// Minimum short-range weight
    pub short_range_min_weight: f32,
    /// Minimum object-size weight
    pub object_min_weight: f32,
    /// Angular tolerance for aim-point object matches (deg)
    pub object_aim_tolerance_deg: f64,
    /// Minimum terrain weight
    pub terrain_min_weight: f32,
    /// Minimum neural weight
    pub neural_min_weight: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            short_range_max_m: sources::SHORT_RANGE_PRIMARY_MAX_M,
            short_range_min_weight: tracking::SHORT_RANGE_MIN_WEIGHT,
            object_min_weight: tracking::OBJECT_MIN_WEIGHT,
            object_aim_tolerance_deg: tracking::OBJECT_AIM_TOLERANCE_DEG,
            terrain_min_weight: tracking::TERRAIN_MIN_WEIGHT,
            neural_min_weight: tracking::NEURAL_MIN_WEIGHT,
        }
    }
}

impl SelectorConfig {
    fn validate(&self) -> RangeResult<()> {
        for weight in [
            self.short_range_min_weight,
            self.object_min_weight,
            self.terrain_min_weight,
            self.neural_min_weight,
        ] {
            ensure(is_unit(f64::from(weight)), "selector weight thresholds must be within [0, 1]")?;
        }
        ensure(self.short_range_max_m > 0.0, "selector.short_range_max_m must be positive")?;
        ensure(
            self.object_aim_tolerance_deg > 0.0,
            "selector.object_aim_tolerance_deg must be positive",
        )
    }
}

/// Tracker smoothing and outlier policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Smoothing factor while stationary
    pub alpha_stationary: f64,
    /// Smoothing factor while tracking
    pub alpha_tracking: f64,
    /// Smoothing factor while panning
    pub alpha_panning: f64,
    /// Relative jump treated as a discontinuity
    pub discontinuity_ratio: f64,
    /// Frames a discontinuity must persist before snapping
    pub discontinuity_confirm_frames: u32,
    /// Consistent rejections accepted as a genuine step
    pub max_consecutive_rejections: u32,
    /// Ratio above which a bimodal jump is accepted outright
    pub bimodal_transition_ratio: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha_stationary: tracking::ALPHA_STATIONARY,
            alpha_tracking: tracking::ALPHA_TRACKING,
            alpha_panning: tracking::ALPHA_PANNING,
            discontinuity_ratio: tracking::DISCONTINUITY_RATIO,
            discontinuity_confirm_frames: tracking::DISCONTINUITY_CONFIRM_FRAMES,
            max_consecutive_rejections: tracking::MAX_CONSECUTIVE_REJECTIONS,
            bimodal_transition_ratio: tracking::BIMODAL_TRANSITION_RATIO,
        }
    }
}

impl TrackerConfig {
    fn validate(&self) -> RangeResult<()> {
        for alpha in [self.alpha_stationary, self.alpha_tracking, self.alpha_panning] {
            ensure(alpha > 0.0 && alpha <= 1.0, "tracker alphas must be within (0, 1]")?;
        }
        ensure(
            self.alpha_stationary <= self.alpha_tracking && self.alpha_tracking <= self.alpha_panning,
            "tracker alphas must rise with motion",
        )?;
        ensure(self.discontinuity_ratio > 0.0, "tracker.discontinuity_ratio must be positive")?;
        ensure(
            self.max_consecutive_rejections >= 1,
            "tracker.max_consecutive_rejections must be >= 1",
        )?;
        ensure(
            self.bimodal_transition_ratio > 1.0,
            "tracker.bimodal_transition_ratio must exceed 1",
        )
    }
}

/// Known physical size for a detection label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownSize {
    /// Detector label, matched case-insensitively
    pub label: String,
    /// Typical height of the object (m)
    pub height_m: f64,
}

impl KnownSize {
    /// Table entry
    pub fn new(label: &str, height_m: f64) -> Self {
        Self {
            label: label.to_string(),
            height_m,
        }
    }
}

/// Object-size ranging parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectsConfig {
    /// Detections below this confidence are ignored
    pub min_detection_confidence: f32,
    /// Known-size table
    pub known_sizes: Vec<KnownSize>,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.3,
            known_sizes: vec![
                KnownSize::new("person", 1.75),
                KnownSize::new("car", 1.5),
                KnownSize::new("truck", 3.0),
                KnownSize::new("bus", 3.2),
                KnownSize::new("bicycle", 1.05),
                KnownSize::new("motorcycle", 1.1),
                KnownSize::new("horse", 1.6),
                KnownSize::new("cow", 1.4),
                KnownSize::new("sheep", 0.9),
                KnownSize::new("deer", 1.0),
                KnownSize::new("dog", 0.6),
                KnownSize::new("stop sign", 0.75),
            ],
        }
    }
}

impl ObjectsConfig {
    fn validate(&self) -> RangeResult<()> {
        ensure(
            is_unit(f64::from(self.min_detection_confidence)),
            "objects.min_detection_confidence must be within [0, 1]",
        )?;
        ensure(
            self.known_sizes.iter().all(|k| k.height_m > 0.0 && !k.label.is_empty()),
            "objects.known_sizes entries need a label and a positive height",
        )
    }

    /// Known height for `label`, if any
    pub fn height_for(&self, label: &str) -> Option<f64> {
        self.known_sizes
            .iter()
            .find(|k| k.label.eq_ignore_ascii_case(label))
            .map(|k| k.height_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(RangingConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RangingConfig::from_json_str(
            r#"{ "terrain": { "max_search_m": 8000.0 }, "calibration": { "forced_family": "Inverse" } }"#,
        )
        .unwrap();

        assert_eq!(config.terrain.max_search_m, 8000.0);
        assert_eq!(config.terrain.bisection_iterations, 5);
        assert_eq!(config.calibration.forced_family, Some(TransformFamily::Inverse));
        assert_eq!(config.sources.neural_max_distance_m, 150.0);
    }

    #[test]
    fn rejects_out_of_range_neural_cap() {
        let err = RangingConfig::from_json_str(r#"{ "sources": { "neural_max_distance_m": 5.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, RangeError::Config(_)));

        let config = RangingConfig::default().with_neural_max_distance(900.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_falling_alphas() {
        let mut config = RangingConfig::default();
        config.tracker.alpha_panning = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = RangingConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RangeError::Config(_)));
    }

    #[test]
    fn file_round_trip() {
        let config = RangingConfig::default()
            .with_neural_max_distance(50.0)
            .with_device_height(1.7);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes()).unwrap();

        let loaded = RangingConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RangingConfig::from_file("/nonexistent/rangefinder.json").unwrap_err();
        assert!(matches!(err, RangeError::Io(_)));
    }

    #[test]
    fn known_size_lookup_is_case_insensitive() {
        let objects = ObjectsConfig::default();
        assert_eq!(objects.height_for("Person"), Some(1.75));
        assert_eq!(objects.height_for("car"), Some(1.5));
        assert_eq!(objects.height_for("ufo"), None);
    }
}
