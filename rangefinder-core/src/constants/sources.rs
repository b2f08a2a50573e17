//! Source Confidence Curve Constants
//!
//! Knot tables for the per-source piecewise-linear confidence curves and the
//! step tables for auxiliary accuracy factors. Adjacent sources overlap in
//! their hand-off zones so that no distance falls between two hard cutoffs.
//!
//! ```text
//! weight
//! 1.0 ┤ SR ▇▇▇▇▇
//!     │      ╲        NN ▇▇▇▇▇▇
//!     │       ╲     ╱        ╲___          TR ▇▇▇▇▇▇▇▇▇▇▇▇____
//!     │ GEO    ╲  ╱  ▇▇▇▇▇▇▇▇▇▇▇▇▇▇▇▇╲____╱                   ╲___
//! 0.0 ┼────────┴─┴────────────────────┴──────────────────────────────
//!     0.3      10  15          50     150      300        2000    5000 m
//! ```

// ===== SHORT-RANGE DEPTH SENSOR =====

/// Confidence knots `(distance_m, weight)` for the short-range depth sensor.
///
/// Peak trust inside 0.5-3 m where time-of-flight returns are dense, tapering
/// to nothing by 12 m where return density collapses.
///
/// Source: typical handheld time-of-flight sensor return density
pub const SHORT_RANGE_KNOTS: &[(f64, f32)] = &[
    (0.1, 0.0),
    (0.3, 0.90),
    (0.5, 0.98),
    (3.0, 0.98),
    (5.0, 0.80),
    (8.0, 0.40),
    (10.0, 0.10),
    (12.0, 0.0),
];

/// Distance below which the short-range sensor may become primary (m).
pub const SHORT_RANGE_PRIMARY_MAX_M: f64 = 8.0;

// ===== NEURAL MONOCULAR DEPTH =====

/// Neural confidence below 2 m (network tends to flatten very near depth).
pub const NEURAL_NEAR_WEIGHT: f32 = 0.3;

/// Distance at which the near ramp starts (m).
pub const NEURAL_RAMP_START_M: f64 = 2.0;

/// Start of the neural plateau (m).
pub const NEURAL_PLATEAU_START_M: f64 = 8.0;

/// End of the neural plateau (m).
pub const NEURAL_PLATEAU_END_M: f64 = 15.0;

/// Neural plateau weight.
pub const NEURAL_PLATEAU_WEIGHT: f32 = 0.9;

/// Weight at 80% of the configured cap.
pub const NEURAL_TAIL_WEIGHT: f32 = 0.35;

/// Weight just below the configured cap, before the hard zero.
pub const NEURAL_CAP_WEIGHT: f32 = 0.2;

/// Default hard cap on neural distance contribution (m).
///
/// Two deployment variants exist (50 m and 150 m). The cap is a configuration
/// parameter; the longer tail is the default because calibration keeps being
/// refreshed from the short-range sensor and the soft compression bounds the
/// extrapolation error.
pub const NEURAL_DEFAULT_MAX_M: f64 = 150.0;

/// Smallest accepted neural cap (m). Keeps the decay tail after the plateau.
pub const NEURAL_MIN_MAX_M: f64 = 20.0;

/// Largest accepted neural cap (m).
pub const NEURAL_MAX_MAX_M: f64 = 500.0;

// ===== GEOMETRIC GROUND-PLANE RANGING =====

/// Confidence knots for the geometric ground-plane estimate.
///
/// Useless below 5 m (pitch noise dominates at steep angles) and near the
/// horizon (tiny angles amplify pitch error).
pub const GEOMETRIC_KNOTS: &[(f64, f32)] = &[
    (5.0, 0.0),
    (10.0, 0.70),
    (50.0, 0.70),
    (200.0, 0.35),
    (600.0, 0.0),
];

// ===== TERRAIN RAY CASTING =====

/// Confidence knots for terrain ray intersections before accuracy factors.
pub const TERRAIN_KNOTS: &[(f64, f32)] = &[
    (20.0, 0.0),
    (100.0, 0.93),
    (300.0, 0.93),
    (1000.0, 0.75),
    (2000.0, 0.50),
    (5000.0, 0.20),
];

/// GPS horizontal accuracy tiers `(max_accuracy_m, factor)`.
///
/// Source: consumer GNSS accuracy classes (open sky, suburban, urban canyon)
pub const GPS_ACCURACY_TIERS: &[(f64, f32)] = &[
    (5.0, 1.0),
    (10.0, 0.85),
    (20.0, 0.6),
];

/// Factor applied when GPS accuracy is worse than every tier.
pub const GPS_ACCURACY_FLOOR: f32 = 0.3;

/// Heading accuracy tiers `(max_accuracy_deg, factor)`.
///
/// Source: magnetometer heading accuracy reported by mobile motion APIs
pub const HEADING_ACCURACY_TIERS: &[(f64, f32)] = &[
    (5.0, 1.0),
    (10.0, 0.85),
    (20.0, 0.6),
];

/// Factor applied when heading accuracy is worse than every tier.
pub const HEADING_ACCURACY_FLOOR: f32 = 0.3;

/// Vertical (altitude) accuracy tiers `(max_accuracy_m, factor)`.
pub const ALTITUDE_ACCURACY_TIERS: &[(f64, f32)] = &[
    (3.0, 1.0),
    (10.0, 0.9),
    (25.0, 0.7),
];

/// Factor applied when altitude accuracy is worse than every tier.
pub const ALTITUDE_ACCURACY_FLOOR: f32 = 0.5;

// ===== OBJECT-SIZE RANGING =====

/// Distance factor knots for object-size ranging, before detection confidence.
pub const OBJECT_KNOTS: &[(f64, f32)] = &[
    (5.0, 0.40),
    (50.0, 0.88),
    (300.0, 0.88),
    (1000.0, 0.50),
    (2000.0, 0.20),
];

/// Smallest depression below horizontal that yields a geometric estimate (deg).
pub const GEOMETRIC_MIN_DEPRESSION_DEG: f64 = 0.3;

/// Nearest geometric estimate reported (m).
pub const GEOMETRIC_MIN_M: f64 = 5.0;

/// Farthest geometric estimate reported (m).
pub const GEOMETRIC_MAX_M: f64 = 800.0;

/// Depression beyond which the flat-ground assumption is penalised (deg).
///
/// Steep downward aims often land on slopes that break the flat-plane model.
pub const SLOPE_PENALTY_START_DEG: f64 = 3.0;

/// Penalty per degree beyond the start.
pub const SLOPE_PENALTY_PER_DEG: f64 = 0.04;

/// Lowest slope penalty factor.
pub const SLOPE_PENALTY_FLOOR: f64 = 0.4;

/// One-sigma pitch error of the attitude estimate (deg).
pub const PITCH_NOISE_DEG: f64 = 0.25;
