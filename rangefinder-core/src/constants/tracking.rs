//! Selection and Tracking Constants
//!
//! Thresholds for the semantic source selector and the dual-hypothesis
//! tracker (Kalman filters, outlier rejection and smoothing).

// ===== SELECTOR THRESHOLDS =====

/// Minimum short-range weight for ShortRangePrimary.
pub const SHORT_RANGE_MIN_WEIGHT: f32 = 0.3;

/// Minimum object-size weight for ObjectPrimary.
pub const OBJECT_MIN_WEIGHT: f32 = 0.3;

/// Angular tolerance between a detection and the aim point (deg).
pub const OBJECT_AIM_TOLERANCE_DEG: f64 = 2.0;

/// Minimum terrain weight for TerrainPrimary.
pub const TERRAIN_MIN_WEIGHT: f32 = 0.15;

/// Minimum neural weight for NeuralPrimary.
pub const NEURAL_MIN_WEIGHT: f32 = 0.05;

/// Minimum weight for a background nomination.
pub const BACKGROUND_MIN_WEIGHT: f32 = 0.05;

/// Relative tolerance for "primary sits on the near bimodal cluster".
pub const NEAR_CLUSTER_TOLERANCE: f64 = 0.3;

/// Terrain weight multiplier when the aim point is on a structure.
pub const STRUCTURE_TERRAIN_FACTOR: f32 = 0.5;

/// Relative uncertainty of short-range readings.
pub const SHORT_RANGE_UNCERTAINTY: f64 = 0.02;

/// Relative uncertainty of object-size readings.
pub const OBJECT_UNCERTAINTY: f64 = 0.10;

/// Relative uncertainty of manual bracket ranging.
pub const MANUAL_UNCERTAINTY: f64 = 0.03;

/// Confidence reported for manual ranging.
pub const MANUAL_CONFIDENCE: f32 = 0.95;

// ===== MOTION TIERS =====

/// Angular speed below which the device is stationary (rad/s).
pub const STATIONARY_MAX_RAD_S: f64 = 0.05;

/// Angular speed below which the device is tracking (rad/s).
pub const TRACKING_MAX_RAD_S: f64 = 0.3;

// ===== KALMAN =====

/// Process noise spectral density while stationary (m²/s³).
pub const PROCESS_NOISE_STATIONARY: f64 = 0.05;

/// Process noise spectral density while tracking (m²/s³).
pub const PROCESS_NOISE_TRACKING: f64 = 1.0;

/// Process noise spectral density while panning (m²/s³).
pub const PROCESS_NOISE_PANNING: f64 = 10.0;

/// Initial distance variance after a reset (m²).
pub const INITIAL_DISTANCE_VARIANCE: f64 = 1.0e4;

/// Initial velocity variance after a reset (m²/s²).
pub const INITIAL_VELOCITY_VARIANCE: f64 = 1.0e2;

/// Base relative measurement standard deviation.
pub const MEASUREMENT_RELATIVE_STD: f64 = 0.02;

/// Distance beyond which measurement noise grows quadratically (m).
pub const MEASUREMENT_NOISE_KNEE_M: f64 = 100.0;

/// Confidence floor used when scaling measurement noise.
pub const MEASUREMENT_MIN_CONFIDENCE: f64 = 0.05;

/// Longest prediction interval accepted between frames (s).
pub const MAX_PREDICT_DT_S: f64 = 1.0;

// ===== OUTLIER FILTER =====

/// Ring buffer capacity for accepted distances.
pub const OUTLIER_WINDOW: usize = 5;

/// Entries required before the outlier check runs.
pub const OUTLIER_MIN_HISTORY: usize = 3;

/// Distance-tiered deviation thresholds `(max_median_m, relative_threshold)`.
pub const OUTLIER_TIERS: &[(f64, f64)] = &[
    (20.0, 0.40),
    (50.0, 0.35),
    (100.0, 0.30),
];

/// Threshold beyond the last tier.
pub const OUTLIER_FAR_THRESHOLD: f64 = 0.25;

/// Ratio above which a bimodal jump is a far-target transition.
pub const BIMODAL_TRANSITION_RATIO: f64 = 3.0;

/// Consecutive consistent rejections accepted as a genuine step.
pub const MAX_CONSECUTIVE_REJECTIONS: u32 = 3;

// ===== SMOOTHER =====

/// Smoothing factor while stationary.
pub const ALPHA_STATIONARY: f64 = 0.15;

/// Smoothing factor while tracking.
pub const ALPHA_TRACKING: f64 = 0.35;

/// Smoothing factor while panning.
pub const ALPHA_PANNING: f64 = 0.6;

/// Relative jump treated as a discontinuity.
pub const DISCONTINUITY_RATIO: f64 = 0.30;

/// Frames a discontinuity must persist before the smoother snaps.
pub const DISCONTINUITY_CONFIRM_FRAMES: u32 = 3;
