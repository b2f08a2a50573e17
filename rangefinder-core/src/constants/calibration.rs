//! Cross-Sensor Calibration Constants
//!
//! Parameters for the rolling neural-to-metric calibration fitted against
//! short-range ground truth.

// ===== SAMPLE WINDOW =====

/// Hard upper bound on the calibration window (samples).
///
/// Sized so the whole window lives inline in the calibrator state.
pub const MAX_CALIBRATION_SAMPLES: usize = 64;

/// Default calibration window capacity (samples).
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Default per-second decay applied to sample weights.
///
/// 0.99^70 ≈ 0.5, so a sample loses half its influence after ~70 s.
pub const DEFAULT_DECAY_PER_SECOND: f64 = 0.99;

/// Samples required before family detection runs.
pub const FAMILY_DETECTION_MIN_SAMPLES: usize = 5;

/// Minimum |Pearson r| required to commit to a transform family.
pub const FAMILY_DETECTION_MIN_CORRELATION: f64 = 0.3;

/// Samples required before a fit is attempted.
pub const MIN_FIT_SAMPLES: usize = 5;

/// Denominator magnitude below which the normal equations are singular.
pub const SINGULAR_DENOMINATOR: f64 = 1e-9;

// ===== GROUND-TRUTH BAND =====

/// Nearest ground-truth distance accepted from the short-range sensor (m).
pub const GROUND_TRUTH_MIN_M: f64 = 0.3;

/// Farthest ground-truth distance accepted from the short-range sensor (m).
pub const GROUND_TRUTH_MAX_M: f64 = 8.0;

// ===== PLAUSIBILITY BOUNDS =====

/// Smallest plausible fitted scale.
pub const SCALE_MIN: f64 = 1e-3;

/// Largest plausible fitted scale.
pub const SCALE_MAX: f64 = 1e4;

/// Largest plausible |shift| (m).
pub const SHIFT_MAX_ABS: f64 = 50.0;

// ===== FIT CONFIDENCE =====

/// Share of fit confidence granted by R² alone with a near-empty window.
pub const COMPLETENESS_BASE: f64 = 0.4;

/// Share of fit confidence earned by filling the window.
pub const COMPLETENESS_GAIN: f64 = 0.6;

// ===== SOFT COMPRESSION =====

/// Default distance beyond which calibrated output is compressed (m).
pub const DEFAULT_COMPRESSION_KNEE_M: f64 = 80.0;

// ===== AGE QUALITY =====

/// Calibration age with full trust (s).
pub const AGE_FULL_TRUST_S: f64 = 45.0;

/// Calibration age at which quality reaches the floor (s).
pub const AGE_FLOOR_S: f64 = 300.0;

/// Quality floor for old calibrations.
///
/// The affine/inverse fit drifts slowly, so old fits remain useful.
pub const AGE_QUALITY_FLOOR: f64 = 0.4;

// ===== NEURAL UNCERTAINTY =====

/// Relative uncertainty inside the calibrated ground-truth range.
pub const IN_RANGE_UNCERTAINTY: f64 = 0.05;

/// Relative uncertainty in the extrapolation zone.
pub const EXTRAPOLATION_UNCERTAINTY: f64 = 0.15;
