//! Scene Classification and Bimodal Analysis Constants

// ===== SCENE CLASSIFIER =====

/// Frames between scene classifications.
pub const CLASSIFY_EVERY_N_FRAMES: u32 = 3;

/// Offset of the cross samples from the aim point, as a fraction of frame size.
pub const CROSS_OFFSET_FRACTION: f32 = 0.05;

/// Side of the sparse global sampling grid.
pub const GLOBAL_GRID_SIDE: usize = 8;

/// Lowest pitch at which sky is considered (rad, ≈ -2°).
pub const SKY_MIN_PITCH_RAD: f64 = -0.035;

/// Aim depth must reach this fraction of the global max to be sky.
pub const SKY_MAX_DEPTH_FRACTION: f32 = 0.9;

/// Aim depth must exceed the global median by this ratio to be sky.
pub const SKY_MEDIAN_RATIO: f32 = 1.5;

/// Maximum local coefficient of variation for sky.
pub const SKY_MAX_CV: f32 = 0.08;

/// Neighbour/centre depth ratio flagging a structure edge.
pub const STRUCTURE_RATIO: f32 = 2.0;

/// Pitch below which structure is not considered (rad, ≈ -20°).
pub const STRUCTURE_MIN_PITCH_RAD: f64 = -0.349;

/// Pitch below which ground is considered (rad, ≈ -3°).
pub const GROUND_MAX_PITCH_RAD: f64 = -0.052;

/// Upper bound on consecutive upward depth ratios for ground.
pub const GROUND_MAX_STEP_RATIO: f32 = 3.0;

// ===== BIMODAL ANALYZER =====

/// Histogram bin count (log-scale).
pub const HISTOGRAM_BINS: usize = 30;

/// Central region sampled, as a fraction of frame width/height.
pub const CENTER_REGION_FRACTION: f32 = 0.3;

/// Maximum samples per axis inside the central region.
pub const MAX_SAMPLES_PER_AXIS: usize = 48;

/// Minimum fraction of samples per cluster.
pub const MIN_CLUSTER_FRACTION: f32 = 0.10;

/// Minimum far/near peak separation ratio.
pub const MIN_PEAK_SEPARATION: f64 = 2.0;

/// Valley must drop below this fraction of the smaller peak.
pub const MAX_VALLEY_FRACTION: f32 = 0.6;

/// Relative error under which terrain corroborates the far cluster.
pub const TERRAIN_AGREEMENT_TOLERANCE: f64 = 0.30;

// ===== CENTRE PATCH =====

/// Half-width of the aim-point median patch (5×5).
pub const CENTER_PATCH_RADIUS: usize = 2;

/// Minimum valid values in the aim-point patch.
pub const CENTER_PATCH_MIN_VALID: usize = 3;

/// Smallest depth accepted from a depth map (m).
pub const DEPTH_MIN_VALID_M: f32 = 0.1;

/// Largest depth accepted from a depth map (m).
pub const DEPTH_MAX_VALID_M: f32 = 1000.0;
